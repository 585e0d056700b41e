use crate::error::Result;

/// Successful handler outcome, optionally carrying a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    body: Option<String>,
}

impl Reply {
    /// Plain acknowledgement.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Acknowledgement carrying data.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn into_body(self) -> Option<String> {
        self.body
    }
}

/// Render a handler outcome as the response text sent to the client.
///
/// `ok` for a bare acknowledgement, the body itself when there is one, and
/// `error <message>` for failures.
pub fn render(outcome: &Result<Reply>) -> String {
    match outcome {
        Ok(reply) => match reply.body() {
            Some(body) => body.to_string(),
            None => "ok".to_string(),
        },
        Err(err) => format!("error {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;

    #[test]
    fn renders_all_outcomes() {
        assert_eq!(render(&Ok(Reply::ok())), "ok");
        assert_eq!(render(&Ok(Reply::with_body("PersistentLevel"))), "PersistentLevel");
        assert_eq!(
            render(&Err(CommandError::Failed("Can not find actor with id 'X'".into()))),
            "error Can not find actor with id 'X'"
        );
        assert_eq!(
            render(&Err(CommandError::UnknownCommand { line: "foo a".into() })),
            "error unknown command 'foo a'"
        );
    }
}
