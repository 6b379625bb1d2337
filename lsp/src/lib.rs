use async_trait::async_trait;
use parking_lot::RwLock;
use shadeparse::pos::SourceLocator;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

#[derive(Debug)]
pub struct Backend {
    client: Client,
    client_capabilities: RwLock<ClientCapabilities>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            client_capabilities: RwLock::new(ClientCapabilities::default()),
        }
    }

    fn has_publish_diagnostics(&self) -> bool {
        let lock = self.client_capabilities.read();
        if let Some(text_document) = &lock.text_document {
            text_document.publish_diagnostics.is_some()
        } else {
            false
        }
    }

    async fn check(&self, uri: Url, text: &str, version: i32) {
        if self.has_publish_diagnostics() {
            self.client
                .publish_diagnostics(uri, diagnostics(text), Some(version))
                .await;
        }
    }
}

/// Parse errors of `text` as LSP diagnostics, with UTF-16 columns.
pub fn diagnostics(text: &str) -> Vec<Diagnostic> {
    let source = text.as_bytes();
    let (_, errors) = shadeparse::parse(source);
    let locator = SourceLocator::new(source);
    let position = |offset: usize| {
        let pos = locator.position_utf16(source, offset);
        Position {
            line: pos.line,
            character: pos.column,
        }
    };
    errors
        .iter()
        .map(|error| Diagnostic {
            range: Range {
                start: position(error.range().0),
                end: position(error.range().1),
            },
            severity: Some(DiagnosticSeverity::ERROR),
            code: None,
            code_description: None,
            source: Some("shadeparse".to_owned()),
            message: error.to_string(),
            related_information: None,
            tags: None,
            data: None,
        })
        .collect()
}

#[async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        {
            let mut lock = self.client_capabilities.write();
            *lock = params.capabilities.clone();
        }
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncKind::FULL.into()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "server initialized!")
            .await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.check(document.uri, &document.text, document.version)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change holds the whole document.
        if let Some(change) = params.content_changes.last() {
            self.check(
                params.text_document.uri,
                &change.text,
                params.text_document.version,
            )
            .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if self.has_publish_diagnostics() {
            self.client
                .publish_diagnostics(params.text_document.uri, Vec::new(), None)
                .await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_diagnostics_for_valid_source() {
        assert!(diagnostics("void main() {}").is_empty());
    }

    #[test]
    fn test_diagnostic_positions_are_utf16() {
        let diagnostics = diagnostics("// é😀\nint x = ;");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].range,
            Range {
                start: Position {
                    line: 1,
                    character: 8,
                },
                end: Position {
                    line: 1,
                    character: 9,
                },
            }
        );
        assert_eq!(
            diagnostics[0].message,
            "expected expression, but found ';'"
        );
    }
}
