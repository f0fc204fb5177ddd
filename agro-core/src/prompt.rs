//! Instruction text for the three analysis modes.
//!
//! Rendering is a pure function of the request: identical input always
//! produces byte-identical output.

use std::fmt::Write;

use crate::{
    error::AnalysisError,
    model::{AnalysisMode, AnalysisRequest, ChatMessage, LocationDescriptor, WeatherSummary},
};

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_WEATHER_DATA: &str = "No weather data available";
pub const NO_PRIOR_ANALYSIS: &str = "No previous analysis available";

const ADVISOR_ROLE: &str = "You are an expert agricultural advisor.";

const FULL_REPORT_SECTIONS: &str = "\
Based on this data, provide a detailed analysis in the following format:

1. BEST CROPS FOR THIS LOCATION:
List 3-5 crops that are most suitable for this climate and location, considering temperature, rainfall, and soil conditions typical of this region.

2. CROP-SPECIFIC RECOMMENDATIONS:
For each recommended crop, provide:
- Optimal planting season/months
- Expected growth duration
- Water requirements
- Temperature preferences
- Yield estimates per hectare

3. SOIL AND WATER MANAGEMENT:
- Soil type recommendations
- Irrigation strategy based on rainfall patterns
- Fertilizer suggestions
- Drainage requirements

4. CLIMATE CONSIDERATIONS:
- How current weather conditions affect crop selection
- Seasonal planning advice
- Risk factors (drought, flooding, extreme temperatures)
- Climate adaptation strategies

5. CROP ROTATION SUGGESTIONS:
Provide a multi-season rotation plan to maintain soil health and maximize productivity.

6. PROFITABILITY ANALYSIS:
- Market potential for recommended crops
- Expected revenue per hectare
- Cost considerations
- Best crops for small vs large farms

7. ACTIONABLE FEEDBACK:
- Immediate next steps for farmers
- Long-term planning advice
- Resources needed
- Common mistakes to avoid

Provide practical, region-specific advice that farmers can immediately act upon.";

const SUMMARY_INSTRUCTIONS: &str = "\
Respond with 5-7 concise bullet points, one line each, covering:
- The best crops for this location
- Optimal planting times
- Key weather-driven considerations
- The top actions a farmer should take now

Do not add headings or an introduction.";

/// What gets sent to the model gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// A single instruction for a text-generation endpoint.
    Completion(String),
    /// System preamble followed by the caller's conversation.
    Chat(Vec<ChatMessage>),
}

impl Prompt {
    pub fn mode_label(&self) -> &'static str {
        match self {
            Prompt::Completion(_) => "completion",
            Prompt::Chat(_) => "chat",
        }
    }
}

/// Render the prompt for `request.mode`.
///
/// Chat mode without any messages is a malformed request, not a default.
pub fn build(request: &AnalysisRequest) -> Result<Prompt, AnalysisError> {
    let weather = request.weather.as_ref();

    match request.mode {
        AnalysisMode::Full => Ok(Prompt::Completion(full_report(&request.location, weather))),
        AnalysisMode::Summarize => Ok(Prompt::Completion(summary(&request.location, weather))),
        AnalysisMode::Chat => {
            if request.messages.is_empty() {
                return Err(AnalysisError::InvalidRequest(
                    "chat mode requires at least one message".to_string(),
                ));
            }

            let context = request
                .analysis_context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(NO_PRIOR_ANALYSIS);

            let mut messages = Vec::with_capacity(request.messages.len() + 1);
            messages.push(ChatMessage::system(chat_preamble(&request.location, weather, context)));
            messages.extend(request.messages.iter().cloned());

            Ok(Prompt::Chat(messages))
        }
    }
}

pub fn full_report(location: &LocationDescriptor, weather: Option<&WeatherSummary>) -> String {
    format!(
        "{ADVISOR_ROLE} Analyze the following location and weather data to provide comprehensive farming recommendations.\n\n\
         {}\n\n{}\n\n{FULL_REPORT_SECTIONS}",
        location_block(location),
        weather_block(weather),
    )
}

pub fn summary(location: &LocationDescriptor, weather: Option<&WeatherSummary>) -> String {
    format!(
        "{ADVISOR_ROLE} Give a short summary of farming guidance for the following location.\n\n\
         {}\n\n{}\n\n{SUMMARY_INSTRUCTIONS}",
        location_block(location),
        weather_block(weather),
    )
}

fn chat_preamble(location: &LocationDescriptor, weather: Option<&WeatherSummary>, context: &str) -> String {
    format!(
        "{ADVISOR_ROLE} You are continuing a conversation with a farmer about the location below. \
         Answer follow-up questions using the location details, the weather data and the previous analysis. \
         Keep answers practical and specific to this region.\n\n\
         {}\n\n{}\n\nPrevious analysis:\n{context}",
        location_block(location),
        weather_block(weather),
    )
}

fn location_block(location: &LocationDescriptor) -> String {
    format!(
        "Location: {}\nCoordinates: Latitude {}, Longitude {}\nRegion Type: {}",
        location.name.as_deref().unwrap_or("Unknown"),
        location.lat,
        location.lon,
        location.kind.as_deref().unwrap_or("Agricultural area"),
    )
}

fn weather_block(weather: Option<&WeatherSummary>) -> String {
    let Some(w) = weather else {
        return NO_WEATHER_DATA.to_string();
    };

    let mut out = String::from("Recent Weather Data:");
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "\n- Average Temperature: {}°C\
         \n- Temperature Range: {}°C to {}°C\
         \n- Precipitation: {} mm\
         \n- Average Humidity: {}%\
         \n- Average Wind Speed: {} m/s\
         \n- Solar Radiation: {} MJ/m²/day\
         \n- Atmospheric Pressure: {} kPa",
        reading(w.avg_temp),
        reading(w.min_temp),
        reading(w.max_temp),
        reading(w.total_precip),
        reading(w.avg_humidity),
        reading(w.avg_wind_speed),
        reading(w.avg_solar),
        reading(w.avg_pressure),
    );
    out
}

fn reading(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn nyc() -> LocationDescriptor {
        LocationDescriptor::new(40.7, -74.0).with_name("NYC")
    }

    fn full_weather() -> WeatherSummary {
        WeatherSummary {
            avg_temp: Some(18.4),
            min_temp: Some(9.1),
            max_temp: Some(27.3),
            total_precip: Some(84.2),
            avg_humidity: Some(66.0),
            avg_wind_speed: Some(3.2),
            avg_solar: Some(17.45),
            avg_pressure: Some(101.2),
        }
    }

    fn completion_text(prompt: Prompt) -> String {
        match prompt {
            Prompt::Completion(text) => text,
            Prompt::Chat(_) => panic!("expected a completion prompt"),
        }
    }

    #[test]
    fn full_report_has_all_seven_sections() {
        let text = full_report(&nyc(), Some(&full_weather()));

        for heading in [
            "1. BEST CROPS FOR THIS LOCATION:",
            "2. CROP-SPECIFIC RECOMMENDATIONS:",
            "3. SOIL AND WATER MANAGEMENT:",
            "4. CLIMATE CONSIDERATIONS:",
            "5. CROP ROTATION SUGGESTIONS:",
            "6. PROFITABILITY ANALYSIS:",
            "7. ACTIONABLE FEEDBACK:",
        ] {
            assert!(text.contains(heading), "missing section {heading}");
        }
        assert!(text.contains("Location: NYC"));
        assert!(text.contains("Coordinates: Latitude 40.7, Longitude -74"));
        assert!(text.contains("Region Type: Agricultural area"));
        assert!(text.contains("- Solar Radiation: 17.45 MJ/m²/day"));
    }

    #[test]
    fn missing_weather_fields_render_as_not_available() {
        let weather = WeatherSummary { avg_temp: Some(0.0), ..WeatherSummary::default() };
        let text = full_report(&nyc(), Some(&weather));

        assert!(text.contains("- Average Temperature: 0°C"));
        assert!(text.contains("- Temperature Range: N/A°C to N/A°C"));
        assert!(text.contains("- Precipitation: N/A mm"));
        assert!(text.contains("- Average Humidity: N/A%"));
        assert!(text.contains("- Atmospheric Pressure: N/A kPa"));
    }

    #[test]
    fn absent_weather_uses_placeholder() {
        let text = summary(&nyc(), None);
        assert!(text.contains(NO_WEATHER_DATA));
        assert!(!text.contains("Recent Weather Data"));
    }

    #[test]
    fn summary_is_a_different_shorter_template() {
        let weather = full_weather();
        let full = full_report(&nyc(), Some(&weather));
        let short = summary(&nyc(), Some(&weather));

        assert!(short.len() < full.len());
        assert!(short.contains("5-7 concise bullet points"));
        assert!(!short.contains("1. BEST CROPS FOR THIS LOCATION:"));
        assert!(!full.contains("bullet points"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut request = AnalysisRequest::new(nyc(), Some(full_weather()), AnalysisMode::Full);
        assert_eq!(build(&request).unwrap(), build(&request).unwrap());

        request.mode = AnalysisMode::Summarize;
        assert_eq!(build(&request).unwrap(), build(&request).unwrap());
    }

    #[test]
    fn mode_selects_template() {
        let full = AnalysisRequest::new(nyc(), None, AnalysisMode::Full);
        let short = AnalysisRequest::new(nyc(), None, AnalysisMode::Summarize);

        assert_eq!(completion_text(build(&full).unwrap()), full_report(&nyc(), None));
        assert_eq!(completion_text(build(&short).unwrap()), summary(&nyc(), None));
    }

    #[test]
    fn chat_without_messages_is_rejected() {
        let request = AnalysisRequest::chat(nyc(), None, None, Vec::new());
        let err = build(&request).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRequest(_)));
    }

    #[test]
    fn chat_prepends_one_system_message_and_keeps_turns() {
        let turns = vec![
            ChatMessage::user("What should I plant in spring?"),
            ChatMessage::assistant("Maize and beans."),
            ChatMessage::user("How much water does maize need?"),
        ];
        let request = AnalysisRequest::chat(
            nyc(),
            Some(full_weather()),
            Some("1. BEST CROPS: maize".to_string()),
            turns.clone(),
        );

        let Prompt::Chat(messages) = build(&request).unwrap() else {
            panic!("expected chat prompt");
        };

        assert_eq!(messages.len(), turns.len() + 1);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Previous analysis:\n1. BEST CROPS: maize"));
        assert!(messages[0].content.contains("Average Temperature: 18.4°C"));
        assert_eq!(&messages[1..], turns.as_slice());
    }

    #[test]
    fn chat_defaults_missing_context() {
        let request =
            AnalysisRequest::chat(nyc(), None, Some("  ".to_string()), vec![ChatMessage::user("hi")]);

        let Prompt::Chat(messages) = build(&request).unwrap() else {
            panic!("expected chat prompt");
        };
        assert!(messages[0].content.ends_with(NO_PRIOR_ANALYSIS));
    }
}
