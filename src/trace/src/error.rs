/// Errors returned from a reconciler are counted by this label.
pub trait TraceableError: std::error::Error {
    fn metric_label(&self) -> String;
}
