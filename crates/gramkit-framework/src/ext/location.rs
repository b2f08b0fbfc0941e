//! Location helpers: great-circle distances, search radii and keyboards.

use std::fmt::Write;

use gramkit_core::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardBuilder, KeyboardButton, Location,
    Message, ReplyMarkup,
};

/// Mean Earth radius used for distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of one degree of latitude, also used for longitude at the equator.
const KM_PER_DEGREE: f64 = 111.32;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// A place shown in venue lists.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyVenue {
    /// Identifier echoed back in the button's callback data.
    pub id: String,
    pub title: String,
    pub location: Location,
}

impl NearbyVenue {
    pub fn new(id: impl Into<String>, title: impl Into<String>, location: Location) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            location,
        }
    }
}

/// Search radius policy plus location formatting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationHandler {
    pub default_radius: f64,
    pub max_radius: f64,
    pub min_radius: f64,
}

impl Default for LocationHandler {
    fn default() -> Self {
        Self {
            default_radius: 5.0,
            max_radius: 50.0,
            min_radius: 0.1,
        }
    }
}

impl LocationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_radius(mut self, km: f64) -> Self {
        self.default_radius = km;
        self
    }

    pub fn radius_bounds(mut self, min_km: f64, max_km: f64) -> Self {
        self.min_radius = min_km;
        self.max_radius = max_km;
        self
    }

    pub fn distance(&self, a: &Location, b: &Location) -> f64 {
        haversine_km(a, b)
    }

    pub fn is_within_radius(&self, center: &Location, point: &Location, radius_km: f64) -> bool {
        haversine_km(center, point) <= radius_km
    }

    /// The requested radius, or the default, kept within the bounds.
    pub fn clamp_radius(&self, requested: Option<f64>) -> f64 {
        requested
            .unwrap_or(self.default_radius)
            .min(self.max_radius)
            .max(self.min_radius)
    }

    /// One-button reply keyboard asking the user to share their location.
    pub fn location_request_keyboard(&self) -> ReplyMarkup {
        KeyboardBuilder::new()
            .button(KeyboardButton::new("📍 Share Location").request_location())
            .resize()
            .one_time()
            .build()
    }

    /// One button per venue, labelled with its distance from `origin`.
    ///
    /// Pressing a button sends `venue_{id}` as callback data.
    pub fn venue_keyboard(&self, venues: &[NearbyVenue], origin: &Location) -> InlineKeyboardMarkup {
        let rows = venues
            .iter()
            .map(|venue| {
                let text = format!(
                    "{} ({:.1}km)",
                    venue.title,
                    haversine_km(origin, &venue.location)
                );
                vec![InlineKeyboardButton::callback(
                    text,
                    format!("venue_{}", venue.id),
                )]
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    pub fn format_location_message(&self, location: &Location, venues: &[NearbyVenue]) -> String {
        let mut message = format!("📍 Location: {}, {}", location.latitude, location.longitude);
        if !venues.is_empty() {
            message.push_str("\n\nNearby venues:");
            for venue in venues {
                let distance = haversine_km(location, &venue.location);
                let _ = write!(message, "\n• {} ({distance:.1}km)", venue.title);
            }
        }
        message
    }

    /// Location carried by a message: a shared location, a venue, or text of
    /// the form `"lat,lon"`.
    ///
    /// Parsed text is not range-checked; see [`validate_location`](Self::validate_location).
    pub fn parse_location(&self, message: &Message) -> Option<Location> {
        if let Some(location) = message.location {
            return Some(location);
        }
        if let Some(venue) = &message.venue {
            return Some(venue.location);
        }
        let (lat, lon) = message.text.as_deref()?.split_once(',')?;
        let latitude = lat.trim().parse().ok()?;
        let longitude = lon.trim().parse().ok()?;
        Some(Location::new(latitude, longitude))
    }

    /// Latitude in ±90 and longitude in ±180. NaN coordinates are invalid.
    pub fn validate_location(&self, location: &Location) -> bool {
        (-90.0..=90.0).contains(&location.latitude)
            && (-180.0..=180.0).contains(&location.longitude)
    }

    /// Approximate `(south-west, north-east)` corners of the square around
    /// `center` with half-side `radius_km`.
    pub fn bounding_box(&self, center: &Location, radius_km: f64) -> (Location, Location) {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lon_delta = radius_km / (KM_PER_DEGREE * center.latitude.to_radians().cos());
        (
            Location::new(center.latitude - lat_delta, center.longitude - lon_delta),
            Location::new(center.latitude + lat_delta, center.longitude + lon_delta),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_message(text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "text": text
        }))
        .unwrap()
    }

    #[test]
    fn test_haversine() {
        let origin = Location::new(0.0, 0.0);
        assert_eq!(haversine_km(&origin, &origin), 0.0);

        let quarter = Location::new(0.0, 90.0);
        assert!((haversine_km(&origin, &quarter) - 10007.5).abs() < 0.1);

        let paris = Location::new(48.8566, 2.3522);
        let london = Location::new(51.5074, -0.1278);
        let there = haversine_km(&paris, &london);
        assert!((there - haversine_km(&london, &paris)).abs() < 1e-9);
        assert!((there - 343.5).abs() < 1.0);
    }

    #[test]
    fn test_clamp_radius() {
        let handler = LocationHandler::new();
        assert_eq!(handler.clamp_radius(None), 5.0);
        assert_eq!(handler.clamp_radius(Some(500.0)), 50.0);
        assert_eq!(handler.clamp_radius(Some(0.0)), 0.1);
        assert_eq!(handler.clamp_radius(Some(12.0)), 12.0);
    }

    #[test]
    fn test_parse_location() {
        let handler = LocationHandler::new();
        assert_eq!(
            handler.parse_location(&text_message("48.85, 2.35")),
            Some(Location::new(48.85, 2.35))
        );
        assert_eq!(handler.parse_location(&text_message("hello")), None);
        assert_eq!(handler.parse_location(&text_message("1,2,3")), None);

        let venue: Message = serde_json::from_value(json!({
            "message_id": 2,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "venue": {
                "location": {"latitude": 1.5, "longitude": 2.5},
                "title": "Cafe",
                "address": "Main St"
            }
        }))
        .unwrap();
        assert_eq!(handler.parse_location(&venue), Some(Location::new(1.5, 2.5)));
    }

    #[test]
    fn test_validate_location() {
        let handler = LocationHandler::new();
        assert!(handler.validate_location(&Location::new(90.0, -180.0)));
        assert!(!handler.validate_location(&Location::new(90.1, 0.0)));
        assert!(!handler.validate_location(&Location::new(0.0, 181.0)));
        assert!(!handler.validate_location(&Location::new(f64::NAN, 0.0)));
    }

    #[test]
    fn test_venue_keyboard_and_message() {
        let handler = LocationHandler::new();
        let origin = Location::new(0.0, 0.0);
        let venues = [NearbyVenue::new("7", "Here", origin)];

        let keyboard = handler.venue_keyboard(&venues, &origin);
        let button = &keyboard.inline_keyboard[0][0];
        assert_eq!(button.text, "Here (0.0km)");
        assert_eq!(button.callback_data.as_deref(), Some("venue_7"));

        assert_eq!(
            handler.format_location_message(&origin, &venues),
            "📍 Location: 0, 0\n\nNearby venues:\n• Here (0.0km)"
        );
        assert_eq!(handler.format_location_message(&origin, &[]), "📍 Location: 0, 0");
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let handler = LocationHandler::new();
        let center = Location::new(45.0, 10.0);
        let (sw, ne) = handler.bounding_box(&center, 10.0);
        assert!(sw.latitude < center.latitude && ne.latitude > center.latitude);
        assert!(sw.longitude < center.longitude && ne.longitude > center.longitude);

        let north = Location::new(ne.latitude, center.longitude);
        assert!((haversine_km(&center, &north) - 10.0).abs() < 0.1);
    }

    #[test]
    fn test_location_request_keyboard() {
        let ReplyMarkup::Reply(markup) = LocationHandler::new().location_request_keyboard() else {
            panic!("expected a reply keyboard");
        };
        assert!(markup.keyboard[0][0].request_location);
        assert!(markup.one_time_keyboard);
    }
}
