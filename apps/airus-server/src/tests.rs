//! HTTP tests for the AiRus server
//!
//! Endpoints are exercised through `axum-test` against the full router with a
//! scripted completion service and the built-in font, so no network access is
//! needed.
//!
//! Test categories:
//! - Health and tool listing
//! - Assistant endpoints (chat, slides, analysis)
//! - Conversion endpoint: every tool, validation failures, cleanup

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::dispatcher::registry::TOOLS;
    use crate::dispatcher::result_name;

    fn tool_id() -> impl Strategy<Value = &'static str> {
        prop::sample::select(TOOLS.iter().map(|t| t.id).collect::<Vec<_>>())
    }

    proptest! {
        /// Property: result names always end with the tool's suffix and extension
        #[test]
        fn result_name_has_suffix_and_extension(
            id in tool_id(),
            base in "[A-Za-z0-9 _-]{0,20}",
            ext in "[a-z]{1,4}",
        ) {
            let tool = TOOLS.iter().find(|t| t.id == id).unwrap();
            let name = result_name(&format!("{}.{}", base, ext), tool.result_suffix, tool.result_extension);
            let expected_end = format!("{}.{}", tool.result_suffix, tool.result_extension);
            prop_assert!(name.ends_with(&expected_end), "{} does not end with {}", name, expected_end);
            prop_assert!(!name.contains('/'));
        }

        /// Property: every tool accepts its own extensions in any case
        #[test]
        fn tools_accept_their_extensions(id in tool_id(), upper in any::<bool>()) {
            let tool = TOOLS.iter().find(|t| t.id == id).unwrap();
            for ext in tool.extensions {
                let name = format!("upload{}", ext);
                let name = if upper { name.to_uppercase() } else { name };
                prop_assert!(tool.accepts(&name, None));
            }
        }

        /// Property: analysis requests below the minimum never reach the model
        #[test]
        fn short_analysis_is_rejected(len in 0usize..50, pad in 0usize..5) {
            use crate::assistant::mock::MockCompletionService;
            use crate::assistant::models::AnalyzeRequest;
            use crate::assistant::{Assistant, AssistantError};
            use std::sync::Arc;

            let mock = MockCompletionService::new();
            let assistant = Assistant::new(Arc::new(mock.clone()));
            let text = format!("{}{}{}", " ".repeat(pad), "w".repeat(len), " ".repeat(pad));

            let result = tokio_test::block_on(assistant.analyze(AnalyzeRequest { text }));
            prop_assert!(matches!(result, Err(AssistantError::InvalidRequest(_))));
            prop_assert!(mock.calls().is_empty());
        }
    }
}

#[cfg(test)]
mod api_tests {
    use std::sync::Arc;

    use airus_convert::{
        get_page_count, read_first_sheet, read_paragraphs, render_paragraphs, write_docx,
        write_xlsx, PageSetup, PdfFont,
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::assistant::mock::MockCompletionService;
    use crate::config::ServerConfig;
    use crate::dispatcher::pipelines::FontSource;
    use crate::state::AppState;

    struct TestApp {
        server: TestServer,
        mock: MockCompletionService,
        uploads: TempDir,
    }

    impl TestApp {
        fn uploads_are_empty(&self) -> bool {
            std::fs::read_dir(self.uploads.path()).unwrap().next().is_none()
        }
    }

    fn create_test_app_with(mock: MockCompletionService, fonts: FontSource) -> TestApp {
        let uploads = tempfile::tempdir().unwrap();
        let config = ServerConfig::try_parse_from([
            "airus-server",
            "--api-key",
            "test-key",
            "--upload-dir",
            uploads.path().to_str().unwrap(),
        ])
        .unwrap();

        let state = AppState::with_services(Arc::new(config), Arc::new(mock.clone()), fonts).unwrap();
        let server = TestServer::new(crate::build_app(Arc::new(state))).unwrap();

        TestApp {
            server,
            mock,
            uploads,
        }
    }

    fn create_test_app(mock: MockCompletionService) -> TestApp {
        create_test_app_with(mock, FontSource::Builtin)
    }

    fn sample_pdf(lines: usize) -> Vec<u8> {
        let paragraphs: Vec<String> = (0..lines).map(|i| format!("Line {}", i)).collect();
        render_paragraphs(&paragraphs, &PdfFont::helvetica(), &PageSetup::default()).unwrap()
    }

    fn file_part(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
        Part::bytes(bytes).file_name(name).mime_type(mime)
    }

    fn form(tool: &str, files: Vec<Part>) -> MultipartForm {
        files
            .into_iter()
            .fold(MultipartForm::new().add_text("tool", tool), |form, part| {
                form.add_part("files", part)
            })
    }

    fn analysis_reply() -> serde_json::Value {
        json!({
            "aiScore": 72,
            "aiHighlights": [{"sentence": "Moreover, it is paramount.", "reason": "Overly formal vocabulary"}],
            "spellingErrors": [{"word": "recieve", "suggestions": ["receive"]}],
            "grammarSuggestions": [],
            "readability": {"flesch": 48.2}
        })
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let app = create_test_app(MockCompletionService::new());
        let response = app.server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<serde_json::Value>();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "airus-server");
    }

    #[tokio::test]
    async fn test_root_reports_status() {
        let app = create_test_app(MockCompletionService::new());
        let response = app.server.get("/").await;
        response.assert_status_ok();

        let json = response.json::<serde_json::Value>();
        assert_eq!(json["status"], "ok");
        assert!(json["message"].as_str().unwrap().contains("AiRus"));
    }

    #[tokio::test]
    async fn test_tools_lists_all_eight() {
        let app = create_test_app(MockCompletionService::new());
        let response = app.server.get("/api/tools").await;
        response.assert_status_ok();

        let json = response.json::<serde_json::Value>();
        assert_eq!(json["count"], 8);
        let merge = json["tools"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"] == "pdf-merge")
            .unwrap();
        assert_eq!(merge["minFiles"], 2);
        assert_eq!(merge["maxFiles"], 10);
        assert_eq!(merge["accept"], ".pdf,application/pdf");
    }

    #[tokio::test]
    async fn test_chat_returns_model_text() {
        let app = create_test_app(MockCompletionService::new().with_reply("Photosynthesis turns light into sugar."));
        let response = app
            .server
            .post("/api/chat")
            .json(&json!({
                "message": "Explain photosynthesis",
                "history": [],
                "tone": "formal",
                "isAssignmentMode": true,
                "isStudentWritten": false
            }))
            .await;

        response.assert_status_ok();
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["text"], "Photosynthesis turns light into sugar.");
        assert_eq!(app.mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_without_message_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let response = app.server.post("/api/chat").json(&json!({"history": []})).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["error"], "Message is required.");
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn test_chat_model_failure_is_500() {
        let app = create_test_app(MockCompletionService::new().with_error(
            crate::assistant::CompletionError::Api {
                status: 503,
                message: "overloaded".to_string(),
            },
        ));
        let response = app
            .server
            .post("/api/chat")
            .json(&json!({"message": "hello"}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json = response.json::<serde_json::Value>();
        assert_eq!(
            json["error"],
            "An error occurred while communicating with the AI service."
        );
    }

    #[tokio::test]
    async fn test_generate_ppt() {
        let app = create_test_app(MockCompletionService::new().with_json_reply(json!({
            "slides": [
                {"title": "What is a cell?", "bullets": ["Basic unit of life", "Has a membrane", "Contains DNA"]},
                {"title": "Organelles", "bullets": ["Nucleus", "Mitochondria", "Ribosomes"]}
            ]
        })));
        let response = app
            .server
            .post("/api/generate-ppt")
            .json(&json!({
                "topic": "Cell biology",
                "slidesCount": 2,
                "includeSpeakerNotes": false,
                "tone": "student"
            }))
            .await;

        response.assert_status_ok();
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["slides"].as_array().unwrap().len(), 2);
        assert_eq!(json["slides"][1]["title"], "Organelles");
        assert!(json["slides"][0].get("speakerNotes").is_none());
    }

    #[tokio::test]
    async fn test_analyze_49_chars_is_400() {
        let app = create_test_app(MockCompletionService::new().with_json_reply(analysis_reply()));
        let response = app
            .server
            .post("/api/analyze")
            .json(&json!({"text": "a".repeat(49)}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<serde_json::Value>();
        assert_eq!(
            json["error"],
            "Please provide at least 50 characters of text to analyze."
        );
        assert!(app.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_50_chars_returns_all_fields() {
        let app = create_test_app(MockCompletionService::new().with_json_reply(analysis_reply()));
        let response = app
            .server
            .post("/api/analyze")
            .json(&json!({"text": "b".repeat(50)}))
            .await;

        response.assert_status_ok();
        let json = response.json::<serde_json::Value>();
        for field in [
            "aiScore",
            "aiHighlights",
            "spellingErrors",
            "grammarSuggestions",
            "readability",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["aiScore"], 72.0);
        assert_eq!(json["readability"]["flesch"], 48.2);
    }

    #[tokio::test]
    async fn test_convert_without_files_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form("pdf-merge", Vec::new()))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], "No file uploaded.");
    }

    #[tokio::test]
    async fn test_convert_unknown_tool_is_501() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-to-pptx",
                vec![file_part(sample_pdf(1), "deck.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status(StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            response.json::<serde_json::Value>()["error"],
            "Tool 'pdf-to-pptx' is not implemented yet."
        );
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_wrong_type_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-split",
                vec![file_part(b"hello".to_vec(), "notes.txt", "text/plain")],
            ))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_too_many_files_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let files = (0..11)
            .map(|i| file_part(sample_pdf(1), &format!("part{}.pdf", i), "application/pdf"))
            .collect();
        let response = app
            .server
            .post("/api/convert")
            .multipart(form("pdf-merge", files))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_merge() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-merge",
                vec![
                    file_part(sample_pdf(1), "chapter1.pdf", "application/pdf"),
                    file_part(sample_pdf(1), "chapter2.pdf", "application/pdf"),
                ],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"chapter1_merged.pdf\""
        );
        assert_eq!(get_page_count(response.as_bytes()).unwrap(), 2);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_merge_single_file_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-merge",
                vec![file_part(sample_pdf(1), "only.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_split() {
        let app = create_test_app(MockCompletionService::new());
        let pdf = sample_pdf(120);
        let pages = get_page_count(&pdf).unwrap();

        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-split",
                vec![file_part(pdf, "handout.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/zip");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"handout_split.zip\""
        );

        let bytes = response.as_bytes().to_vec();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes));
        assert_eq!(archive.unwrap().len(), pages as usize);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_split_single_page_is_400() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-split",
                vec![file_part(sample_pdf(1), "one.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_unlock() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-unlock",
                vec![file_part(sample_pdf(3), "locked.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"locked_unlocked.pdf\""
        );
        assert_eq!(get_page_count(response.as_bytes()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_convert_pdf_unlock_aes_restricted() {
        let restricted =
            include_bytes!("../../../crates/airus-convert/tests/fixtures/restricted-aes256.pdf");
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-unlock",
                vec![file_part(restricted.to_vec(), "handout.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status_ok();
        let body = response.as_bytes();
        assert_eq!(get_page_count(body).unwrap(), 3);
        assert!(!body.windows(8).any(|w| w == b"/Encrypt"));
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_unlock_garbage_is_500() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-unlock",
                vec![file_part(b"%PDF-1.7 nonsense".to_vec(), "bad.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json = response.json::<serde_json::Value>();
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("An error occurred during conversion:"));
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_pdf_to_docx() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "pdf-to-docx",
                vec![file_part(sample_pdf(3), "lecture.pdf", "application/pdf")],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header("content-type"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"lecture_converted.docx\""
        );
        let paragraphs = read_paragraphs(response.as_bytes()).unwrap();
        assert!(paragraphs.iter().any(|p| p.contains("Line 2")));
    }

    #[tokio::test]
    async fn test_convert_docx_to_pdf() {
        let app = create_test_app(MockCompletionService::new());
        let docx = write_docx(&["Essay title".to_string(), "First paragraph.".to_string()]).unwrap();
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "docx-to-pdf",
                vec![file_part(
                    docx,
                    "essay.docx",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                )],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"essay_converted.pdf\""
        );
        assert_eq!(get_page_count(response.as_bytes()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_convert_docx_to_pdf_font_unavailable_is_500() {
        let fonts = FontSource::remote("http://127.0.0.1:9/NotoSans-Regular.ttf", reqwest::Client::new());
        let app = create_test_app_with(MockCompletionService::new(), fonts);
        let docx = write_docx(&["Essay".to_string()]).unwrap();

        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "docx-to-pdf",
                vec![file_part(docx, "essay.docx", "application/octet-stream")],
            ))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json = response.json::<serde_json::Value>();
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("Could not load the required font"));
        assert!(app.uploads_are_empty());
    }

    #[tokio::test]
    async fn test_convert_csv_to_xlsx() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "csv-to-xlsx",
                vec![file_part(b"subject,score\nmath,90\nart,85\n".to_vec(), "scores.csv", "text/csv")],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"scores_converted.xlsx\""
        );
        let rows = read_first_sheet(response.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["art".to_string(), "85".to_string()]);
    }

    #[tokio::test]
    async fn test_convert_xlsx_to_csv() {
        let app = create_test_app(MockCompletionService::new());
        let rows = vec![
            vec!["term".to_string(), "definition".to_string()],
            vec!["osmosis".to_string(), "water moves, passively".to_string()],
        ];
        let xlsx = write_xlsx("Sheet1", &rows).unwrap();

        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "xlsx-to-csv",
                vec![file_part(
                    xlsx,
                    "glossary.xlsx",
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                )],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "text/csv");
        assert_eq!(
            response.text(),
            "term,definition\nosmosis,\"water moves, passively\"\n"
        );
    }

    #[tokio::test]
    async fn test_convert_txt_to_json() {
        let app = create_test_app(MockCompletionService::new());
        let response = app
            .server
            .post("/api/convert")
            .multipart(form(
                "txt-to-json",
                vec![file_part(b"Remember the quiz on Friday.".to_vec(), "todo.txt", "text/plain")],
            ))
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/json");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"todo_converted.json\""
        );
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["name"], "todo.txt");
        assert_eq!(json["content"], "Remember the quiz on Friday.");
        assert!(app.uploads_are_empty());
    }
}
