//! Content providers: opaque generators of realistic values.
//!
//! The engine never inspects how these values are produced. It asks for a
//! name, a country, a device, and treats the answer as a black box. The
//! [`BuiltinProvider`] ships small built-in tables so a Matrix can run with
//! no external data.

use crate::error::EnvError;
use crate::random::SimRandom;
use crate::types::Timezone;
use serde::{Deserialize, Serialize};

/// Device, operating system and browser of a simulated client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_type: String,
    pub os: String,
    pub browser: String,
}

/// Source of realistic strings for agents and events.
///
/// Every method draws from the caller's random stream, so values stay
/// reproducible as long as the caller's stream is.
pub trait ContentProvider {
    /// Full person name, e.g. "Ada Lovelace".
    fn full_name(&self, random: &mut SimRandom) -> Result<String, EnvError>;

    /// Email address plausibly belonging to `full_name`.
    fn email(&self, random: &mut SimRandom, full_name: &str) -> Result<String, EnvError>;

    /// Company name.
    fn company(&self, random: &mut SimRandom) -> Result<String, EnvError>;

    /// ISO 3166-1 alpha-2 country code.
    fn country_code(&self, random: &mut SimRandom) -> Result<String, EnvError>;

    /// Timezones in use in the given country.
    fn timezones_for(&self, country_code: &str) -> Result<&'static [Timezone], EnvError>;

    /// Device type, OS and browser, drawn together so combinations are coherent.
    fn device_os_browser(&self, random: &mut SimRandom) -> Result<DeviceProfile, EnvError>;

    /// File extension (without the dot).
    fn file_extension(&self, random: &mut SimRandom) -> Result<String, EnvError>;
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Amara", "Ben", "Carla", "Chen", "Dylan", "Elena", "Emeka", "Farah",
    "George", "Hana", "Helly", "Igor", "Irving", "Jamal", "Julia", "Kenji", "Lena", "Luis",
    "Mark", "Maya", "Nina", "Omar", "Priya", "Quinn", "Rosa", "Sam", "Sofia", "Tomasz",
    "Uma", "Victor", "Wen", "Xavier", "Yara", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Adeyemi", "Bauer", "Castillo", "Dubois", "Eriksson", "Fischer", "Garcia", "Hughes",
    "Ivanova", "Jensen", "Kowalski", "Larsen", "Martin", "Nakamura", "Okafor", "Patel",
    "Quinn", "Rossi", "Schmidt", "Tanaka", "Urban", "Varga", "Walker", "Xu", "Yilmaz", "Zhang",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com", "outlook.com", "yahoo.com", "proton.me", "icloud.com", "hey.com",
];

const COMPANY_PREFIXES: &[&str] = &[
    "Acme", "Blue Harbor", "Copperline", "Driftwood", "Evergreen", "Foxglove", "Granite",
    "Helix", "Ironbark", "Juniper", "Keystone", "Lumen", "Meridian", "Northwind", "Oakridge",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "Labs", "Systems", "Group", "Partners", "Industries", "Analytics", "Holdings", "Studio",
];

const FILE_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "xlsx", "pptx", "png", "jpg", "gif", "mp4", "mov", "mp3", "zip", "txt",
    "csv", "psd", "svg",
];

const DEVICES: &[((&str, &str, &str), f64)] = &[
    (("Desktop", "Windows", "Chrome"), 30.0),
    (("Desktop", "Windows", "Microsoft Edge"), 8.0),
    (("Desktop", "Windows", "Firefox"), 5.0),
    (("Desktop", "Windows", "Internet Explorer"), 1.5),
    (("Desktop", "Mac OS X", "Chrome"), 12.0),
    (("Desktop", "Mac OS X", "Safari"), 9.0),
    (("Desktop", "Mac OS X", "Firefox"), 2.0),
    (("Desktop", "Linux", "Chrome"), 2.0),
    (("Desktop", "Linux", "Firefox"), 2.0),
    (("Mobile", "iOS", "Mobile Safari"), 14.0),
    (("Mobile", "Android", "Chrome"), 11.0),
    (("Tablet", "iOS", "Mobile Safari"), 2.5),
    (("Tablet", "Android", "Chrome"), 1.0),
];

macro_rules! tz {
    ($name:expr, $hours:expr) => {
        Timezone { name: $name, utc_offset_secs: ($hours as f64 * 3600.0) as i32 }
    };
}

const COUNTRY_TIMEZONES: &[(&str, &[Timezone])] = &[
    ("US", &[
        tz!("America/New_York", -5),
        tz!("America/Chicago", -6),
        tz!("America/Denver", -7),
        tz!("America/Los_Angeles", -8),
        tz!("America/Anchorage", -9),
        tz!("Pacific/Honolulu", -10),
    ]),
    ("CA", &[tz!("America/Toronto", -5), tz!("America/Vancouver", -8), tz!("America/Halifax", -4)]),
    ("MX", &[tz!("America/Mexico_City", -6)]),
    ("BR", &[tz!("America/Sao_Paulo", -3)]),
    ("AR", &[tz!("America/Argentina/Buenos_Aires", -3)]),
    ("GB", &[tz!("Europe/London", 0)]),
    ("IE", &[tz!("Europe/Dublin", 0)]),
    ("DE", &[tz!("Europe/Berlin", 1)]),
    ("FR", &[tz!("Europe/Paris", 1)]),
    ("ES", &[tz!("Europe/Madrid", 1)]),
    ("IT", &[tz!("Europe/Rome", 1)]),
    ("NL", &[tz!("Europe/Amsterdam", 1)]),
    ("PL", &[tz!("Europe/Warsaw", 1)]),
    ("SE", &[tz!("Europe/Stockholm", 1)]),
    ("FI", &[tz!("Europe/Helsinki", 2)]),
    ("TR", &[tz!("Europe/Istanbul", 3)]),
    ("NG", &[tz!("Africa/Lagos", 1)]),
    ("ZA", &[tz!("Africa/Johannesburg", 2)]),
    ("KE", &[tz!("Africa/Nairobi", 3)]),
    ("IN", &[tz!("Asia/Kolkata", 5.5)]),
    ("SG", &[tz!("Asia/Singapore", 8)]),
    ("CN", &[tz!("Asia/Shanghai", 8)]),
    ("KR", &[tz!("Asia/Seoul", 9)]),
    ("JP", &[tz!("Asia/Tokyo", 9)]),
    ("AU", &[tz!("Australia/Sydney", 10), tz!("Australia/Perth", 8), tz!("Australia/Adelaide", 9.5)]),
    ("NZ", &[tz!("Pacific/Auckland", 12)]),
];

/// Provider backed by small built-in tables.
#[derive(Debug, Clone, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ContentProvider for BuiltinProvider {
    fn full_name(&self, random: &mut SimRandom) -> Result<String, EnvError> {
        let first = random.choice(FIRST_NAMES)?;
        let last = random.choice(LAST_NAMES)?;
        Ok(format!("{} {}", first, last))
    }

    fn email(&self, random: &mut SimRandom, full_name: &str) -> Result<String, EnvError> {
        let local: String = full_name
            .split_whitespace()
            .map(|part| part.to_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        let domain = random.choice(EMAIL_DOMAINS)?;
        // Popular names collide, so some addresses get a numeric suffix
        if random.chance(0.4) {
            Ok(format!("{}{}@{}", local, random.int_range(1, 999), domain))
        } else {
            Ok(format!("{}@{}", local, domain))
        }
    }

    fn company(&self, random: &mut SimRandom) -> Result<String, EnvError> {
        let prefix = random.choice(COMPANY_PREFIXES)?;
        let suffix = random.choice(COMPANY_SUFFIXES)?;
        Ok(format!("{} {}", prefix, suffix))
    }

    fn country_code(&self, random: &mut SimRandom) -> Result<String, EnvError> {
        let (code, _) = random.choice(COUNTRY_TIMEZONES)?;
        Ok(code.to_string())
    }

    fn timezones_for(&self, country_code: &str) -> Result<&'static [Timezone], EnvError> {
        COUNTRY_TIMEZONES
            .iter()
            .find(|(code, _)| *code == country_code)
            .map(|(_, zones)| *zones)
            .ok_or_else(|| EnvError::UnknownCountry(country_code.to_string()))
    }

    fn device_os_browser(&self, random: &mut SimRandom) -> Result<DeviceProfile, EnvError> {
        let (device_type, os, browser) = random.weighted_choice(DEVICES)?;
        Ok(DeviceProfile {
            device_type: device_type.to_string(),
            os: os.to_string(),
            browser: browser.to_string(),
        })
    }

    fn file_extension(&self, random: &mut SimRandom) -> Result<String, EnvError> {
        Ok(random.choice(FILE_EXTENSIONS)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_country_has_a_timezone() {
        let provider = BuiltinProvider::new();
        for (code, zones) in COUNTRY_TIMEZONES {
            assert!(!zones.is_empty(), "{} has no timezone", code);
            assert_eq!(provider.timezones_for(code).unwrap().len(), zones.len());
        }
    }

    #[test]
    fn test_unknown_country() {
        let provider = BuiltinProvider::new();
        assert_eq!(
            provider.timezones_for("XX"),
            Err(EnvError::UnknownCountry("XX".to_string()))
        );
    }

    #[test]
    fn test_half_hour_offsets() {
        let provider = BuiltinProvider::new();
        let india = provider.timezones_for("IN").unwrap();
        assert_eq!(india[0].utc_offset_secs, 5 * 3600 + 1800);
    }

    #[test]
    fn test_email_derived_from_name() {
        let provider = BuiltinProvider::new();
        let mut random = SimRandom::new(3);
        let email = provider.email(&mut random, "Ada Lovelace").unwrap();
        assert!(email.starts_with("ada.lovelace"));
        assert!(email.contains('@'));
    }

    #[test]
    fn test_provider_is_deterministic() {
        let provider = BuiltinProvider::new();
        let mut a = SimRandom::new(11);
        let mut b = SimRandom::new(11);
        for _ in 0..20 {
            assert_eq!(provider.full_name(&mut a).unwrap(), provider.full_name(&mut b).unwrap());
            assert_eq!(
                provider.device_os_browser(&mut a).unwrap(),
                provider.device_os_browser(&mut b).unwrap()
            );
        }
    }
}
