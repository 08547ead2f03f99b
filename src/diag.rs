use serde::Serialize;

/// One non-fatal event observed while assembling a scan: a skipped sheet,
/// an unreadable file, or a silent cell fallback. Diagnostics ride along
/// with the result instead of failing it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code, "{}", message);
        self.events.push(Diagnostic {
            code: code.to_string(),
            message,
        });
    }

    #[allow(dead_code)]
    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Diagnostic> {
        self.events
    }
}
