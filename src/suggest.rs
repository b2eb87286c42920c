//! The generative-AI collaborator: error explanations and sample programs.
//!
//! Calls are fire-and-forget from the session's point of view. Failures never
//! reach the transcript; they resolve to a static fallback text instead.

use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::event::AppEvent;
use crate::language::Language;

pub const SUGGESTION_FALLBACK: &str = "Failed to analyze code. Please try again.";
pub const GENERATION_FALLBACK: &str = "// Failed to generate code. Please try again.";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("suggestions are disabled (no API key configured)")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("service returned no text")]
    EmptyResponse,
}

impl From<SuggestError> for SessionError {
    fn from(e: SuggestError) -> Self {
        SessionError::SuggestionServiceFailure(e.to_string())
    }
}

/// Everything needed to explain one terminal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub run_id: u64,
    pub code: String,
    pub error: String,
    pub language: Language,
}

pub trait SuggestionService: Send + Sync {
    /// Markdown explanation of `request.error`.
    fn code_suggestion<'a>(
        &'a self,
        request: &'a SuggestionRequest,
    ) -> BoxFuture<'a, Result<String, SuggestError>>;

    /// A complete sample program in `language`.
    fn generate_code(&self, language: Language) -> BoxFuture<'_, Result<String, SuggestError>>;
}

/// Used when no API key is configured: every call fails immediately, so
/// callers show the fallback text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSuggestions;

impl SuggestionService for DisabledSuggestions {
    fn code_suggestion<'a>(
        &'a self,
        _request: &'a SuggestionRequest,
    ) -> BoxFuture<'a, Result<String, SuggestError>> {
        Box::pin(async { Err(SuggestError::Disabled) })
    }

    fn generate_code(&self, _language: Language) -> BoxFuture<'_, Result<String, SuggestError>> {
        Box::pin(async { Err(SuggestError::Disabled) })
    }
}

/// Ask for an explanation, falling back to static guidance on any failure.
pub async fn suggest_or_fallback(
    service: &dyn SuggestionService,
    request: &SuggestionRequest,
) -> String {
    match service.code_suggestion(request).await {
        Ok(text) => text,
        Err(e) => {
            let error = SessionError::from(e);
            warn!(%error, run_id = request.run_id, "Suggestion request failed");
            SUGGESTION_FALLBACK.to_string()
        }
    }
}

/// Ask for a sample program, falling back to a placeholder comment.
pub async fn generate_or_fallback(service: &dyn SuggestionService, language: Language) -> String {
    match service.generate_code(language).await {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, %language, "Code generation failed");
            GENERATION_FALLBACK.to_string()
        }
    }
}

/// Dispatch a suggestion request in the background. The result comes back as
/// `AppEvent::Suggestion` tagged with the request's run.
pub fn spawn_suggestion(
    service: Arc<dyn SuggestionService>,
    request: SuggestionRequest,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) {
    debug!(run_id = request.run_id, language = %request.language, "Requesting suggestion");
    tokio::spawn(async move {
        let text = suggest_or_fallback(service.as_ref(), &request).await;
        let _ = event_tx.send(AppEvent::Suggestion {
            run_id: request.run_id,
            text,
        });
    });
}

// --- Gemini client ---

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn generate_content(&self, prompt: String) -> Result<String, SuggestError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SuggestError::Status(response.status().as_u16()));
        }
        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(SuggestError::EmptyResponse);
        }
        Ok(clean_code_fences(&text))
    }
}

impl SuggestionService for GeminiClient {
    fn code_suggestion<'a>(
        &'a self,
        request: &'a SuggestionRequest,
    ) -> BoxFuture<'a, Result<String, SuggestError>> {
        Box::pin(self.generate_content(suggestion_prompt(request)))
    }

    fn generate_code(&self, language: Language) -> BoxFuture<'_, Result<String, SuggestError>> {
        Box::pin(self.generate_content(generation_prompt(language)))
    }
}

// --- Prompts ---

/// Strip Markdown code-fence markers from model output.
pub fn clean_code_fences(text: &str) -> String {
    static OPENING: OnceLock<Option<Regex>> = OnceLock::new();
    let opening = OPENING.get_or_init(|| Regex::new(r"```\w+\n").ok());
    let text = match opening {
        Some(re) => re.replace_all(text, ""),
        None => text.into(),
    };
    text.replace("```", "").trim().to_string()
}

/// Error markers the runtime prints, most specific first.
fn error_markers(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &[
            "IndentationError: ",
            "SyntaxError: ",
            "NameError: ",
            "TypeError: ",
            "ZeroDivisionError: ",
        ],
        Language::JavaScript => &[
            "SyntaxError: ",
            "ReferenceError: ",
            "TypeError: ",
            "RangeError: ",
        ],
        Language::Java => &[
            "error: ",
            "Exception in thread \"main\"",
            "cannot find symbol",
            "incompatible types",
        ],
        _ => &[],
    }
}

/// Name the kind of error in `error`, or `"Error"` when unrecognised.
pub fn error_kind(language: Language, error: &str) -> &'static str {
    error_markers(language)
        .iter()
        .find(|marker| error.contains(*marker))
        .copied()
        .unwrap_or("Error")
}

fn reference_example(language: Language) -> &'static str {
    match language {
        Language::Python => {
            r#"# Simple calculator in Python
def add(x, y):
    return x + y

def divide(x, y):
    if y == 0:
        return "Cannot divide by zero"
    return x / y

print("Addition:", add(10, 5))
print("Division:", divide(10, 5))"#
        }
        Language::JavaScript => {
            r#"// Interactive counter with JavaScript
let count = 0;

function increment() {
    count++;
    console.log("Count increased to:", count);
}

console.log("Initial count:", count);
increment();"#
        }
        Language::Java => {
            r#"public class Calculator {
    public static void main(String[] args) {
        int a = 10;
        int b = 5;
        System.out.println("Addition: " + (a + b));
        System.out.println("Division: " + (a / b));
    }
}"#
        }
        _ => "",
    }
}

fn generation_task(language: Language) -> &'static str {
    match language {
        Language::Python => {
            "Create a number guessing game where the computer picks a random number and the user tries to guess it, with hints for \"too high\" or \"too low\""
        }
        Language::JavaScript => {
            "Create a todo list manager with add, remove, and mark-as-complete functionality, storing tasks in an array"
        }
        Language::Html => {
            "Create a responsive contact form with name, email, message fields, and proper validation"
        }
        Language::Java => {
            "Create a simple bank account system with deposit, withdraw, and balance check methods"
        }
        Language::Cpp => {
            "Create a student grade calculator that takes marks in different subjects and calculates total, average, and grade"
        }
        Language::Rust => {
            "Create a command-line file organizer that lists files in a directory with their sizes"
        }
        Language::Php => "Create a simple blog post system with create and read functionality",
    }
}

pub fn suggestion_prompt(request: &SuggestionRequest) -> String {
    let language = request.language;
    let kind = error_kind(language, &request.error);
    format!(
        "As an expert {language} developer, analyze this code and error:

CODE:
{code}

ERROR:
{error}

Please provide:
1. EXACT line number and what's causing the {kind}
2. Clear explanation of why this error occurs
3. Working solution with proper syntax
4. Common mistakes to avoid

Here's a working example for reference:
{example}

Format your response in markdown with:
- Error location and type at the top
- Clear explanation in the middle
- Working solution without code fence markers
- Best practices and tips at the bottom
",
        code = request.code,
        error = request.error,
        example = reference_example(language),
    )
}

pub fn generation_prompt(language: Language) -> String {
    format!(
        "As an expert {language} developer, create a complete working example:

Task: {task}

Requirements:
1. Must be fully functional and error-free
2. Include proper error handling
3. Follow {language} best practices
4. Include helpful comments
5. Show example usage with output

Reference Example:
{example}

Provide ONLY the working code without any markdown or code fence markers.
Ensure proper formatting and indentation.
Code must be complete and runnable as-is.
",
        task = generation_task(language),
        example = reference_example(language),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_session_error() {
        assert_eq!(
            SessionError::from(SuggestError::Status(503)),
            SessionError::SuggestionServiceFailure("service returned HTTP 503".to_string())
        );
    }

    fn request(language: Language, error: &str) -> SuggestionRequest {
        SuggestionRequest {
            run_id: 1,
            code: "print(x)".to_string(),
            error: error.to_string(),
            language,
        }
    }

    #[test]
    fn clean_fences() {
        assert_eq!(
            clean_code_fences("Fix:\n```python\nprint(1)\n```\n"),
            "Fix:\nprint(1)"
        );
        assert_eq!(clean_code_fences("```\ncode\n```"), "code");
        assert_eq!(clean_code_fences("  plain  "), "plain");
    }

    #[test]
    fn classifies_known_errors() {
        assert_eq!(
            error_kind(Language::Python, "NameError: name 'x' is not defined"),
            "NameError: "
        );
        assert_eq!(
            error_kind(
                Language::Java,
                "Exception in thread \"main\" java.lang.ArithmeticException"
            ),
            "Exception in thread \"main\""
        );
        assert_eq!(error_kind(Language::Rust, "error[E0425]"), "Error");
        assert_eq!(error_kind(Language::Python, "Segmentation fault"), "Error");
    }

    #[test]
    fn suggestion_prompt_carries_code_error_and_kind() {
        let prompt = suggestion_prompt(&request(Language::Python, "NameError: x"));
        assert!(prompt.starts_with("As an expert python developer"));
        assert!(prompt.contains("CODE:\nprint(x)\n"));
        assert!(prompt.contains("ERROR:\nNameError: x\n"));
        assert!(prompt.contains("what's causing the NameError: \n"));
        assert!(prompt.contains("# Simple calculator in Python"));
    }

    #[test]
    fn generation_prompt_names_task() {
        let prompt = generation_prompt(Language::Rust);
        assert!(prompt.contains("Task: Create a command-line file organizer"));
        assert!(prompt.contains("Follow rust best practices"));
    }

    #[tokio::test]
    async fn disabled_service_falls_back() {
        let service = DisabledSuggestions;
        let text = suggest_or_fallback(&service, &request(Language::Python, "boom")).await;
        assert_eq!(text, SUGGESTION_FALLBACK);
        let code = generate_or_fallback(&service, Language::Cpp).await;
        assert_eq!(code, GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn spawned_suggestion_reports_its_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut req = request(Language::Python, "boom");
        req.run_id = 7;
        spawn_suggestion(Arc::new(DisabledSuggestions), req, tx);
        match rx.recv().await.unwrap() {
            AppEvent::Suggestion { run_id, text } => {
                assert_eq!(run_id, 7);
                assert_eq!(text, SUGGESTION_FALLBACK);
            }
            AppEvent::Transport(other) => panic!("unexpected {other:?}"),
        }
    }

    mod gemini {
        use wiremock::matchers::{body_string_contains, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;

        fn answer(text: &str) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": text}]}}]
            }))
        }

        #[tokio::test]
        async fn posts_prompt_and_cleans_answer() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/gemini-pro:generateContent"))
                .and(query_param("key", "test-key"))
                .and(body_string_contains("CODE:\\nprint(x)"))
                .respond_with(answer("Assign it first:\n```python\nx = 1\n```"))
                .expect(1)
                .mount(&server)
                .await;

            let client = GeminiClient::new("test-key").with_base_url(server.uri());
            let text = client
                .code_suggestion(&request(Language::Python, "NameError: x"))
                .await
                .unwrap();
            assert_eq!(text, "Assign it first:\nx = 1");
            server.verify().await;
        }

        #[tokio::test]
        async fn model_is_configurable() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/gemini-1.5-flash:generateContent"))
                .and(body_string_contains("Task: "))
                .respond_with(answer("fn main() {}"))
                .expect(1)
                .mount(&server)
                .await;

            let client = GeminiClient::new("k")
                .with_base_url(format!("{}/", server.uri()))
                .with_model("gemini-1.5-flash");
            let code = client.generate_code(Language::Rust).await.unwrap();
            assert_eq!(code, "fn main() {}");
        }

        #[tokio::test]
        async fn http_failure_falls_back() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let client = GeminiClient::new("k").with_base_url(server.uri());
            let err = client
                .code_suggestion(&request(Language::Java, "error: boom"))
                .await
                .unwrap_err();
            assert!(matches!(err, SuggestError::Status(503)));
            let text = suggest_or_fallback(&client, &request(Language::Java, "error: boom")).await;
            assert_eq!(text, SUGGESTION_FALLBACK);
        }

        #[tokio::test]
        async fn empty_answer_is_an_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "candidates": []
                })))
                .mount(&server)
                .await;

            let client = GeminiClient::new("k").with_base_url(server.uri());
            let err = client.generate_code(Language::Php).await.unwrap_err();
            assert!(matches!(err, SuggestError::EmptyResponse));
        }
    }
}
