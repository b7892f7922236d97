//! Tabular view of iteration records, formatted the way the forms display them.

use crate::methods::{
    BisectionRecord, FixedPointRecord, MethodResult, NewtonRecord, SecantRecord, Status,
};
use crate::precision::Precision;

/// A record that can be shown as one row of the iteration table.
pub trait TableRow {
    /// Column labels, in display order.
    const HEADERS: &'static [&'static str];
    /// Symbol the converged estimate is reported under.
    const ESTIMATE_LABEL: &'static str = "x";

    fn cells(&self, precision: &Precision) -> Vec<String>;
}

impl TableRow for BisectionRecord {
    const HEADERS: &'static [&'static str] =
        &["n", "a", "b", "p", "f(a)", "f(b)", "f(p)", "f(a)*f(p)", "error"];
    const ESTIMATE_LABEL: &'static str = "p";

    fn cells(&self, precision: &Precision) -> Vec<String> {
        let mut cells = vec![self.n.to_string()];
        cells.extend(
            [
                self.a, self.b, self.p, self.fa, self.fb, self.fp, self.fa_fp, self.error,
            ]
            .map(|v| precision.format(v)),
        );
        cells
    }
}

impl TableRow for FixedPointRecord {
    const HEADERS: &'static [&'static str] = &["n", "x_n", "g(x_n)", "|g(x_n) - x_n|"];

    fn cells(&self, precision: &Precision) -> Vec<String> {
        let mut cells = vec![self.n.to_string()];
        cells.extend([self.xn, self.gxn, self.error].map(|v| precision.format(v)));
        cells
    }
}

impl TableRow for NewtonRecord {
    const HEADERS: &'static [&'static str] = &["n", "x_n", "f(x_n)", "f'(x_n)", "x_{n+1}", "error"];

    fn cells(&self, precision: &Precision) -> Vec<String> {
        let mut cells = vec![self.n.to_string()];
        cells.extend(
            [self.xn, self.fxn, self.dfxn, self.x_next, self.error].map(|v| precision.format(v)),
        );
        cells
    }
}

impl TableRow for SecantRecord {
    const HEADERS: &'static [&'static str] = &["n", "x_{n-1}", "x_n", "x_{n+1}", "error"];

    fn cells(&self, precision: &Precision) -> Vec<String> {
        let mut cells = vec![self.n.to_string()];
        cells.extend(
            [self.x_prev, self.x_curr, self.x_next, self.error].map(|v| precision.format(v)),
        );
        cells
    }
}

pub fn headers<R: TableRow>() -> Vec<String> {
    R::HEADERS.iter().map(|h| h.to_string()).collect()
}

pub fn rows<R: TableRow>(records: &[R], precision: &Precision) -> Vec<Vec<String>> {
    records.iter().map(|r| r.cells(precision)).collect()
}

/// One-line outcome shown under the table.
pub fn summary<R: TableRow>(result: &MethodResult<R>, precision: &Precision) -> String {
    match &result.status {
        Status::Converged { estimate } => format!(
            "approximation found after {} iteration(s): {} ≈ {}",
            result.records.len(),
            R::ESTIMATE_LABEL,
            precision.format(*estimate)
        ),
        Status::MaxIterationsReached => {
            "maximum number of iterations reached without meeting the tolerance".to_string()
        }
        Status::Failed { reason } => reason.to_string(),
    }
}
