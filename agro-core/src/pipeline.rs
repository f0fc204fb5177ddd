//! One analysis invocation: validate, render, call the model, extract.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    config::GatewayConfig,
    envelope,
    error::{AnalysisError, GatewayConfigError},
    gateway::{self, GatewayRequest, GenerationSettings, ModelGateway},
    model::{self, AnalysisPayload, AnalysisRequest, AnalysisResponse},
    prompt,
};
use serde_json::Value;

/// Where an invocation currently is. `Failed` is reachable from
/// `Validating`, `BuildingPrompt` and `CallingModel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    BuildingPrompt,
    CallingModel,
    ExtractingText,
    Done,
    Failed,
}

impl Stage {
    /// Next stage on the success path; `None` once terminal.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::Validating),
            Stage::Validating => Some(Stage::BuildingPrompt),
            Stage::BuildingPrompt => Some(Stage::CallingModel),
            Stage::CallingModel => Some(Stage::ExtractingText),
            Stage::ExtractingText => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn can_fail(self) -> bool {
        matches!(self, Stage::Validating | Stage::BuildingPrompt | Stage::CallingModel)
    }
}

/// Stage of a single invocation, logged on every transition.
#[derive(Debug)]
struct Progress {
    stage: Stage,
}

impl Progress {
    fn start() -> Self {
        Self { stage: Stage::Idle }
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.successor() {
            debug!(from = ?self.stage, to = ?next);
            self.stage = next;
        }
    }

    fn fail(&mut self, err: &AnalysisError) {
        debug_assert!(self.stage.can_fail(), "{:?} cannot fail", self.stage);
        debug!(from = ?self.stage, to = ?Stage::Failed, error = %err);
        self.stage = Stage::Failed;
    }
}

/// Stateless orchestrator; clone freely, one per server.
#[derive(Debug, Clone)]
pub struct AnalysisService {
    gateway: Result<Arc<dyn ModelGateway>, GatewayConfigError>,
    generation: GenerationSettings,
}

impl AnalysisService {
    pub fn new(gateway: Arc<dyn ModelGateway>, generation: GenerationSettings) -> Self {
        Self { gateway: Ok(gateway), generation }
    }

    /// A service whose every model call fails with the given configuration error.
    pub fn unconfigured(reason: GatewayConfigError, generation: GenerationSettings) -> Self {
        Self { gateway: Err(reason), generation }
    }

    /// Build the gateway from config. A missing credential does not prevent
    /// construction; analyses then fail with [`AnalysisError::GatewayConfig`].
    pub fn from_config(config: &GatewayConfig) -> Self {
        let generation = config.generation();
        match gateway::gateway_from_config(config) {
            Ok(gateway) => Self::new(gateway, generation),
            Err(err) => {
                warn!(error = %err, "model gateway is not configured");
                Self::unconfigured(err, generation)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_ok()
    }

    /// Run the pipeline on an undecoded request body.
    ///
    /// The location is checked before anything else is decoded, so a body
    /// without usable `lat`/`lon` is always [`AnalysisError::MissingLocation`].
    /// Other fields that fail to decode are [`AnalysisError::Internal`].
    pub async fn analyze_json(&self, body: Value) -> Result<AnalysisResponse, AnalysisError> {
        let mut progress = Progress::start();
        progress.advance();
        if model::location_coordinates(&body).is_none() {
            let err = AnalysisError::MissingLocation;
            progress.fail(&err);
            return Err(err);
        }

        let payload: AnalysisPayload = match serde_json::from_value(body) {
            Ok(payload) => payload,
            Err(err) => {
                let err = AnalysisError::Internal(err.to_string());
                error!(error = %err, "could not decode analysis request body");
                progress.fail(&err);
                return Err(err);
            }
        };
        self.validated(payload, progress).await
    }

    /// Run the pipeline on a decoded wire payload.
    pub async fn analyze(&self, payload: AnalysisPayload) -> Result<AnalysisResponse, AnalysisError> {
        let mut progress = Progress::start();
        progress.advance();
        self.validated(payload, progress).await
    }

    /// Run the pipeline on an already validated request.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let mut progress = Progress::start();
        progress.advance();
        self.execute(request, progress).await
    }

    async fn validated(
        &self,
        payload: AnalysisPayload,
        mut progress: Progress,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let Some(request) = payload.into_request() else {
            let err = AnalysisError::MissingLocation;
            progress.fail(&err);
            return Err(err);
        };
        self.execute(request, progress).await
    }

    async fn execute(
        &self,
        request: AnalysisRequest,
        mut progress: Progress,
    ) -> Result<AnalysisResponse, AnalysisError> {
        info!(
            coordinates = %request.location.coordinates(),
            name = request.location.name.as_deref().unwrap_or("Unknown"),
            mode = %request.mode,
            weather = request.weather.is_some(),
            "received analysis request"
        );

        progress.advance();
        let prompt = prompt::build(&request).inspect_err(|err| progress.fail(err))?;

        progress.advance();
        debug!(kind = prompt.mode_label());
        let gateway = match &self.gateway {
            Ok(gateway) => gateway,
            Err(err) => {
                error!(error = %err, "cannot call model gateway");
                let err = AnalysisError::from(err.clone());
                progress.fail(&err);
                return Err(err);
            }
        };

        let body = GatewayRequest::from_prompt(prompt, &self.generation);
        let raw = match gateway.generate(&body).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(error = %err, mode = %request.mode, "model gateway call failed");
                let err = AnalysisError::from(err);
                progress.fail(&err);
                return Err(err);
            }
        };
        info!(mode = %request.mode, "received model reply");

        progress.advance();
        let response = envelope::build_response(&request, &raw, Utc::now());

        progress.advance();
        debug!(chars = response.analysis.len());
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        envelope::NO_ANALYSIS,
        error::GatewayError,
        model::{AnalysisMode, ChatMessage, LocationDescriptor, Role, WeatherSummary},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, SubsecRound};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Replays a fixed reply and records every request it sees.
    #[derive(Debug)]
    pub(crate) struct ScriptedGateway {
        reply: Result<Value, GatewayError>,
        pub(crate) seen: Mutex<Vec<GatewayRequest>>,
    }

    impl ScriptedGateway {
        pub(crate) fn replying(reply: Value) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply), seen: Mutex::new(Vec::new()) })
        }

        pub(crate) fn failing(err: GatewayError) -> Arc<Self> {
            Arc::new(Self { reply: Err(err), seen: Mutex::new(Vec::new()) })
        }

        pub(crate) fn calls(&self) -> Vec<GatewayRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate(&self, request: &GatewayRequest) -> Result<Value, GatewayError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    pub(crate) fn service(gateway: Arc<ScriptedGateway>) -> AnalysisService {
        AnalysisService::new(gateway, GenerationSettings::default())
    }

    fn nyc_payload(extra: Value) -> AnalysisPayload {
        let mut body = json!({ "location": { "lat": 40.7, "lon": -74.0, "name": "NYC" } });
        if let (Some(obj), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            obj.extend(extra.clone());
        }
        serde_json::from_value(body).unwrap()
    }

    fn inputs(request: &GatewayRequest) -> &str {
        match request {
            GatewayRequest::Completion { inputs, .. } => inputs,
            GatewayRequest::Chat { .. } => panic!("expected completion request"),
        }
    }

    #[tokio::test]
    async fn full_mode_without_weather_succeeds() {
        let gateway = ScriptedGateway::replying(json!([{ "generated_text": "Grow kale." }]));
        let started = Utc::now().trunc_subsecs(3);

        let response = service(gateway.clone())
            .analyze(nyc_payload(json!({ "weatherData": null })))
            .await
            .unwrap();

        assert_eq!(response.analysis, "Grow kale.");
        assert_eq!(response.weather_summary, None);
        assert_eq!(response.location.coordinates, "40.7, -74");

        // Stamps carry milliseconds, so compare against the start at that precision.
        let stamped = DateTime::parse_from_rfc3339(&response.timestamp).unwrap();
        assert!(stamped.with_timezone(&Utc) >= started);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(inputs(&calls[0]).contains("7. ACTIONABLE FEEDBACK:"));
    }

    #[tokio::test]
    async fn missing_latitude_never_reaches_the_gateway() {
        let gateway = ScriptedGateway::replying(json!([]));
        let payload: AnalysisPayload =
            serde_json::from_value(json!({ "location": { "lon": -74.0 } })).unwrap();

        let err = service(gateway.clone()).analyze(payload).await.unwrap_err();

        assert_eq!(err, AnalysisError::MissingLocation);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn summarize_mode_sends_the_short_template() {
        let gateway = ScriptedGateway::replying(json!([{ "generated_text": "- Plant maize" }]));
        let weather = json!({
            "avgTemp": 18.0, "minTemp": 9.0, "maxTemp": 27.0, "totalPrecip": 80.0,
            "avgHumidity": 60.0, "avgWindSpeed": 3.0, "avgSolar": 17.0, "avgPressure": 101.0
        });

        let response = service(gateway.clone())
            .analyze(nyc_payload(json!({ "summarize": true, "weatherData": weather })))
            .await
            .unwrap();

        assert_eq!(response.analysis, "- Plant maize");
        assert_eq!(response.weather_summary.as_ref().and_then(|w| w.avg_temp), Some(18.0));
        assert!(inputs(&gateway.calls()[0]).contains("bullet points"));
    }

    #[tokio::test]
    async fn chat_mode_uses_chat_request() {
        let gateway = ScriptedGateway::replying(
            json!({ "choices": [{ "message": { "content": "Use drip irrigation." } }] }),
        );
        let request = AnalysisRequest::chat(
            LocationDescriptor::new(1.5, 2.5),
            Some(WeatherSummary::default()),
            Some("earlier report".into()),
            vec![ChatMessage::user("How do I water?")],
        );

        let response = service(gateway.clone()).run(request).await.unwrap();
        assert_eq!(response.analysis, "Use drip irrigation.");

        match &gateway.calls()[0] {
            GatewayRequest::Chat { messages, .. } => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, Role::System);
                assert_eq!(messages[1], ChatMessage::user("How do I water?"));
            }
            other => panic!("expected chat request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_mode_without_messages_is_invalid() {
        let gateway = ScriptedGateway::replying(json!([]));
        let err = service(gateway.clone())
            .analyze(nyc_payload(json!({ "chatMode": true, "messages": [] })))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidRequest(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_surfaced() {
        let gateway = ScriptedGateway::failing(GatewayError::Status {
            status: 503,
            body: "overloaded".into(),
        });

        let err = service(gateway).analyze(nyc_payload(json!({}))).await.unwrap_err();
        assert_eq!(err, AnalysisError::Upstream { status: 503, body: "overloaded".into() });
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_after_validation() {
        let svc = AnalysisService::from_config(&GatewayConfig::default());
        assert!(!svc.is_configured());

        let err = svc.analyze(nyc_payload(json!({}))).await.unwrap_err();
        assert!(matches!(err, AnalysisError::GatewayConfig(_)));

        let payload: AnalysisPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(svc.analyze(payload).await.unwrap_err(), AnalysisError::MissingLocation);
    }

    #[tokio::test]
    async fn unreadable_reply_still_completes() {
        let gateway = ScriptedGateway::replying(json!({ "error": "weird" }));
        let response = service(gateway)
            .run(AnalysisRequest::new(LocationDescriptor::new(0.0, 0.0), None, AnalysisMode::Full))
            .await
            .unwrap();

        assert_eq!(response.analysis, NO_ANALYSIS);
    }

    #[test]
    fn success_path_visits_every_stage_once() {
        let mut stage = Stage::Idle;
        let mut path = vec![stage];
        while let Some(next) = stage.successor() {
            stage = next;
            path.push(stage);
        }

        assert_eq!(
            path,
            [
                Stage::Idle,
                Stage::Validating,
                Stage::BuildingPrompt,
                Stage::CallingModel,
                Stage::ExtractingText,
                Stage::Done,
            ]
        );
        assert_eq!(Stage::Failed.successor(), None);
        assert!(!Stage::Idle.can_fail());
        assert!(!Stage::ExtractingText.can_fail());
    }

    #[tokio::test]
    async fn raw_body_without_coordinates_is_missing_location() {
        let gateway = ScriptedGateway::replying(json!([]));
        let svc = service(gateway.clone());

        for body in [
            json!({ "location": "NYC" }),
            json!({ "location": { "lon": -74.0, "name": 5 } }),
            json!({ "location": { "lon": -74.0 }, "weatherData": { "avgTemp": "21" } }),
            json!({ "location": { "lon": -74.0 }, "messages": [{ "role": "tool", "content": "x" }] }),
        ] {
            let err = svc.analyze_json(body.clone()).await.unwrap_err();
            assert_eq!(err, AnalysisError::MissingLocation, "body {body}");
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn raw_body_with_bad_fields_is_internal() {
        let gateway = ScriptedGateway::replying(json!([]));
        let body = json!({ "location": { "lat": 1, "lon": 2 }, "weatherData": { "avgTemp": "21" } });

        let err = service(gateway.clone()).analyze_json(body).await.unwrap_err();

        assert!(matches!(err, AnalysisError::Internal(_)));
        assert!(gateway.calls().is_empty());
    }
}
