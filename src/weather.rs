use rand::seq::IndexedRandom;

pub const SUNNY: &str = "sunny";
pub const CLOUDY: &str = "cloudy";
pub const RAINY: &str = "rainy";

pub const TAGS: [&str; 3] = [SUNNY, CLOUDY, RAINY];

/// Supplies the weather tag stamped on a new event. Stands in for real
/// forecast data until events are matched against the forecast.
pub trait WeatherPicker: Send + Sync {
    fn pick(&self) -> String;
}

pub struct RandomWeather;

impl WeatherPicker for RandomWeather {
    fn pick(&self) -> String {
        TAGS.choose(&mut rand::rng())
            .copied()
            .unwrap_or(SUNNY)
            .to_string()
    }
}

pub struct FixedWeather(pub String);

impl FixedWeather {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl WeatherPicker for FixedWeather {
    fn pick(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_weather_stays_within_known_tags() {
        let picker = RandomWeather;
        for _ in 0..50 {
            let tag = picker.pick();
            assert!(TAGS.contains(&tag.as_str()), "unexpected tag {tag}");
        }
    }
}
