//! Chart protocol writer.
//!
//! # Toyota Way: Visual Management (目で見る管理)
//! One block per call: a family with all its dimensions, or one point with
//! its `BEGIN`/`END` framing. Blocks are formatted first and written under
//! a single lock.

use std::fmt::Write as _;
use std::io::{self, Write};

use parking_lot::Mutex;

use beanfetch_core::{
    ChartType, ClassifiedAttribute, FamilyDeclaration, MetricPoint, ServiceCheck, Sink,
};

use crate::error::Result;

/// Banner printed once when the metric budget is exhausted.
pub const LIMIT_BANNER: &str =
    "       ------- METRIC LIMIT REACHED: ATTRIBUTES BELOW WON'T BE COLLECTED -------";

const INSTANCE_RULE: &str = "#####################################";

/// Formats a family declaration block.
#[must_use]
pub fn format_declaration(declaration: &FamilyDeclaration) -> String {
    let family = &declaration.family;
    let mut block = format!(
        "CHART {} {} {} {} {} {}",
        family.id, family.name, family.title, family.units, family.family, family.context
    );
    if family.chart_type == ChartType::Stacked {
        block.push_str(" stacked");
    }
    block.push('\n');
    for dimension in &declaration.dimensions {
        let _ = writeln!(block, "DIMENSION {} {}", dimension.id, dimension.name);
    }
    block
}

/// Formats a point block.
#[must_use]
pub fn format_point(point: &MetricPoint) -> String {
    format!(
        "BEGIN {}\nSET {} = {:10.6}\nEND\n",
        point.family_id, point.dimension_id, point.value
    )
}

/// Sink writing the chart protocol to `W`.
///
/// Service checks have no representation in the protocol; they are kept
/// until drained with [`TextProtocolSink::take_service_checks`].
pub struct TextProtocolSink<W: Write + Send> {
    out: Mutex<W>,
    service_checks: Mutex<Vec<ServiceCheck>>,
}

impl<W: Write + Send> std::fmt::Debug for TextProtocolSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextProtocolSink")
            .field("pending_service_checks", &self.service_checks.lock().len())
            .finish_non_exhaustive()
    }
}

impl TextProtocolSink<io::Stdout> {
    /// Creates a sink on standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TextProtocolSink<W> {
    /// Creates a sink writing to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            service_checks: Mutex::new(Vec::new()),
        }
    }

    /// Returns and clears the delivered service checks.
    pub fn take_service_checks(&self) -> Vec<ServiceCheck> {
        std::mem::take(&mut *self.service_checks.lock())
    }

    /// Flushes the output.
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    pub fn flush(&self) -> Result<()> {
        self.out.lock().flush()?;
        Ok(())
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, block: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(block.as_bytes()).and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "cannot write to sink output");
        }
    }
}

impl<W: Write + Send> Sink for TextProtocolSink<W> {
    fn declare_family(&self, declaration: &FamilyDeclaration) {
        self.emit(&format_declaration(declaration));
    }

    fn send_metric_point(&self, point: &MetricPoint) {
        self.emit(&format_point(point));
    }

    fn do_send_service_check(&self, check: &ServiceCheck) {
        tracing::debug!(name = %check.name, status = %check.status, "service check");
        self.service_checks.lock().push(check.clone());
    }

    fn display_metric_reached(&self) {
        self.emit(&format!("\n\n\n{LIMIT_BANNER}\n\n\n\n"));
    }

    fn display_non_matching_attribute(&self, attribute: &ClassifiedAttribute) {
        self.emit(&format!("       Not Matching: {attribute}\n"));
    }

    fn display_instance_name(&self, instance: &str) {
        self.emit(&format!(
            "\n{INSTANCE_RULE}\nInstance: {instance}\n{INSTANCE_RULE}\n\n"
        ));
    }

    fn display_matching_attribute(&self, attribute: &ClassifiedAttribute, rank: usize, limit: usize) {
        self.emit(&format!("       Matching: {rank}/{limit}. {attribute}\n"));
    }
}
