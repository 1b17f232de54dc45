use serde::{Deserialize, Serialize};

use super::WeatherError;

/// Longest accepted city query, after trimming.
const MAX_QUERY_LENGTH: usize = 60;

/// What to look up.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl LocationQuery {
    /// Validate free-form search input: letters, digits, whitespace and `,.'-`.
    pub fn parse_city(input: &str) -> Result<Self, WeatherError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(WeatherError::InvalidQuery(
                "Please enter a city name or zip code.".to_string(),
            ));
        }
        let valid = trimmed.chars().count() <= MAX_QUERY_LENGTH
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || ",.'-".contains(c));
        if !valid {
            return Err(WeatherError::InvalidQuery(trimmed.to_string()));
        }
        Ok(LocationQuery::City(trimmed.to_string()))
    }

    pub fn coordinates(lat: f64, lon: f64) -> Result<Self, WeatherError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(WeatherError::InvalidQuery(format!("{}, {}", lat, lon)));
        }
        Ok(LocationQuery::Coordinates { lat, lon })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherRecord {
    pub name: String,
    #[serde(default)]
    pub sys: SysInfo,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Option<Wind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SysInfo {
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub humidity: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wind {
    pub speed: f64,
}

impl WeatherRecord {
    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    /// Theme keyword for the current conditions ("clouds", "rain", ...).
    pub fn theme(&self) -> String {
        self.condition()
            .map(|c| c.main.to_lowercase())
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn icon_url(&self) -> Option<String> {
        self.condition()
            .filter(|c| !c.icon.is_empty())
            .map(|c| format!("https://openweathermap.org/img/wn/{}@2x.png", c.icon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_city() {
        assert_eq!(
            LocationQuery::parse_city("  St. John's, CA ").unwrap(),
            LocationQuery::City("St. John's, CA".to_string())
        );
        assert!(LocationQuery::parse_city("   ").is_err());
        assert!(LocationQuery::parse_city("London; DROP").is_err());
        assert!(LocationQuery::parse_city(&"a".repeat(61)).is_err());
        assert!(LocationQuery::parse_city(&"a".repeat(60)).is_ok());
    }

    #[test]
    fn test_coordinates_range() {
        assert!(LocationQuery::coordinates(51.5, -0.12).is_ok());
        assert!(LocationQuery::coordinates(91.0, 0.0).is_err());
        assert!(LocationQuery::coordinates(0.0, 181.0).is_err());
    }

    #[test]
    fn test_parse_weather_response() {
        let json = r#"{"coord":{"lon":-0.1257,"lat":51.5085},"weather":[{"id":803,"main":"Clouds","description":"broken clouds","icon":"04d"}],"main":{"temp":14.2,"feels_like":13.6,"temp_min":13.1,"temp_max":15.3,"pressure":1012,"humidity":77},"wind":{"speed":4.63,"deg":240},"sys":{"country":"GB","sunrise":1697004000,"sunset":1697043000},"name":"London","cod":200}"#;

        let record: WeatherRecord = serde_json::from_str(json).expect("Failed to parse weather test JSON");
        assert_eq!(record.name, "London");
        assert_eq!(record.sys.country.as_deref(), Some("GB"));
        assert_eq!(record.main.humidity, Some(77));
        assert_eq!(record.theme(), "clouds");
        assert_eq!(
            record.icon_url().as_deref(),
            Some("https://openweathermap.org/img/wn/04d@2x.png")
        );
    }

    #[test]
    fn test_theme_default() {
        let record = WeatherRecord {
            name: "Nowhere".to_string(),
            sys: SysInfo::default(),
            main: MainReadings {
                temp: 0.0,
                feels_like: None,
                humidity: None,
            },
            weather: vec![],
            wind: None,
        };
        assert_eq!(record.theme(), "default");
        assert!(record.icon_url().is_none());
    }
}
