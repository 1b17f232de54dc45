use weather_offline_core::{Response, WeatherRecord};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// One-line status for a routed response
pub fn format_status(response: &Response) -> String {
    if response.is_error() {
        return "network error (no response)".to_string();
    }
    let body = match &response.body {
        Some(body) => format!("{} bytes", body.len()),
        None => "null body".to_string(),
    };
    format!("{} ({})", response.status, body)
}

/// Human-readable weather summary, e.g. "London, GB: 11°C, light rain"
pub fn format_weather(record: &WeatherRecord) -> String {
    let place = match &record.sys.country {
        Some(country) => format!("{}, {}", record.name, country),
        None => record.name.clone(),
    };
    let mut line = format!("{}: {:.0}°C", place, record.main.temp);
    if let Some(condition) = record.condition() {
        let description = if condition.description.is_empty() {
            &condition.main
        } else {
            &condition.description
        };
        line.push_str(&format!(", {}", description));
    }
    if let Some(humidity) = record.main.humidity {
        line.push_str(&format!(", humidity {}%", humidity));
    }
    if let Some(ref wind) = record.wind {
        line.push_str(&format!(", wind {:.1} m/s", wind.speed));
    }
    line
}
