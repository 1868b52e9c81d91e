//! Browser client: the client-side analytics SDK, simulated.
//!
//! The client owns everything a real SDK would keep in the browser: device
//! id, active distinct id, session id, super properties and the current
//! page. It turns a semantic action into a fully composed property payload;
//! recording the event is left to the owning [`Person`](crate::Person).

use crate::error::SimError;
use crate::event::PROPERTY_GEOIP_COUNTRY_CODE;
use chrono::{DateTime, FixedOffset};
use matrix_env::{DeviceProfile, Properties};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Person-side state the client reads while composing a payload.
pub struct CaptureContext<'a> {
    /// Simulated instant, in the person's local offset
    pub time: DateTime<FixedOffset>,

    /// Group associations (`group type -> group key`)
    pub groups: &'a BTreeMap<String, String>,

    /// Country code used for GeoIP decoration
    pub country_code: &'a str,

    /// Active feature flags, emitted as `$feature/<key>`
    pub feature_flags: &'a Properties,
}

/// A simulated browser with client-side tracking.
#[derive(Debug, Clone)]
pub struct BrowserClient {
    /// Device id, used as distinct id until `identify`
    device_id: String,

    /// Device type, OS and browser
    device: DeviceProfile,

    /// Distinct id events are currently attributed to
    active_distinct_id: String,

    /// Session id, set only while a session is open
    active_session_id: Option<String>,

    /// Properties merged into every captured event
    super_properties: Properties,

    /// Page the client currently displays
    current_url: Option<String>,

    is_logged_in: bool,
}

impl BrowserClient {
    /// Creates a client for a fresh, anonymous device.
    pub fn new(device_id: Uuid, device: DeviceProfile) -> Self {
        let device_id = device_id.to_string();
        Self {
            active_distinct_id: device_id.clone(),
            device_id,
            device,
            active_session_id: None,
            super_properties: Properties::new(),
            current_url: None,
            is_logged_in: false,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn active_distinct_id(&self) -> &str {
        &self.active_distinct_id
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn super_properties(&self) -> &Properties {
        &self.super_properties
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    /// Opens a session with the given id.
    pub fn start_session(&mut self, session_id: String) {
        self.active_session_id = Some(session_id);
    }

    /// Closes the session and forgets the current page.
    ///
    /// Callers must capture the trailing `$pageleave` before calling this.
    pub fn end_session(&mut self) {
        self.current_url = None;
        self.active_session_id = None;
    }

    pub fn set_current_url(&mut self, url: Option<String>) {
        self.current_url = url;
    }

    /// Composes the full property payload of an event.
    ///
    /// Layering, last writer wins:
    /// 1. Client state (ids, device, groups, timestamps)
    /// 2. Super properties
    /// 3. Page context (`$current_url`, `$host`, `$pathname`)
    /// 4. Caller properties; `$set`/`$set_once` objects merge key-wise
    /// 5. GeoIP and feature flag decoration
    pub fn compose(&mut self, context: &CaptureContext<'_>, properties: Option<Properties>) -> Properties {
        let mut combined = Properties::new();
        combined.insert("$distinct_id".to_string(), json!(self.active_distinct_id));
        combined.insert("$lib".to_string(), json!("web"));
        combined.insert("$device_type".to_string(), json!(self.device.device_type));
        combined.insert("$os".to_string(), json!(self.device.os));
        combined.insert("$browser".to_string(), json!(self.device.browser));
        combined.insert("$session_id".to_string(), json!(self.active_session_id));
        combined.insert("$device_id".to_string(), json!(self.device_id));
        let groups: Properties = context
            .groups
            .iter()
            .map(|(group_type, group_key)| (group_type.clone(), json!(group_key)))
            .collect();
        combined.insert("$groups".to_string(), Value::Object(groups));
        combined.insert("$timestamp".to_string(), json!(context.time.to_rfc3339()));
        combined.insert(
            "$time".to_string(),
            json!(context.time.timestamp_micros() as f64 / 1_000_000.0),
        );

        combined.extend(self.super_properties.clone());

        if let Some(url) = &self.current_url {
            let (host, path) = split_url(url);
            combined.insert("$current_url".to_string(), json!(url));
            combined.insert("$host".to_string(), json!(host));
            combined.insert("$pathname".to_string(), json!(path));
        }

        let mut set = take_object(&mut combined, "$set").unwrap_or_default();
        let mut set_once = take_object(&mut combined, "$set_once");

        if let Some(mut properties) = properties {
            let referrer = properties
                .get("$referrer")
                .and_then(Value::as_str)
                .filter(|referrer| !referrer.is_empty())
                .map(str::to_string);
            if let Some(referrer) = referrer {
                let referring_domain = if referrer == "$direct" {
                    referrer.clone()
                } else {
                    split_url(&referrer).0.to_string()
                };
                let mut referrer_properties = Properties::new();
                referrer_properties.insert("$referrer".to_string(), json!(referrer));
                referrer_properties.insert("$referring_domain".to_string(), json!(referring_domain));
                self.register(referrer_properties.clone());
                set.extend(referrer_properties);
                combined.insert("$referring_domain".to_string(), json!(referring_domain));
            }
            if let Some(caller_set) = take_object(&mut properties, "$set") {
                set.extend(caller_set);
            }
            if let Some(caller_set_once) = take_object(&mut properties, "$set_once") {
                set_once.get_or_insert_with(Properties::new).extend(caller_set_once);
            }
            combined.extend(properties);
        }

        // GeoIP
        combined.insert(PROPERTY_GEOIP_COUNTRY_CODE.to_string(), json!(context.country_code));
        set.insert(PROPERTY_GEOIP_COUNTRY_CODE.to_string(), json!(context.country_code));

        combined.insert("$set".to_string(), Value::Object(set));
        if let Some(set_once) = set_once {
            combined.insert("$set_once".to_string(), Value::Object(set_once));
        }

        for (flag_key, flag_value) in context.feature_flags {
            combined.insert(format!("$feature/{}", flag_key), flag_value.clone());
        }

        combined
    }

    /// Builds the `$identify` payload and switches the active distinct id.
    ///
    /// With `distinct_id = None` this is a plain people-set.
    pub fn identify(&mut self, distinct_id: Option<&str>, set_properties: Properties) -> Properties {
        let mut properties = Properties::new();
        properties.insert("$distinct_id".to_string(), json!(self.active_distinct_id));
        properties.insert("$set".to_string(), Value::Object(set_properties));
        if let Some(distinct_id) = distinct_id.filter(|id| !id.is_empty()) {
            self.is_logged_in = true;
            if self.device_id == self.active_distinct_id {
                properties.insert("$anon_distinct_id".to_string(), json!(self.device_id));
            }
            properties.insert("$user_id".to_string(), json!(distinct_id));
            self.active_distinct_id = distinct_id.to_string();
        }
        properties
    }

    /// Logs out: events are attributed to the device id again.
    pub fn reset(&mut self) {
        self.active_distinct_id = self.device_id.clone();
        self.is_logged_in = false;
    }

    /// Registers super properties.
    pub fn register(&mut self, super_properties: Properties) {
        self.super_properties.extend(super_properties);
    }

    /// Removes super properties. Fails without removing anything if any key is absent.
    pub fn unregister(&mut self, keys: &[&str]) -> Result<(), SimError> {
        if let Some(missing) = keys.iter().find(|key| !self.super_properties.contains_key(**key)) {
            return Err(SimError::UnknownSuperProperty(missing.to_string()));
        }
        for key in keys {
            self.super_properties.remove(*key);
        }
        Ok(())
    }
}

/// Removes `key` from `properties`, returning it if it was an object.
fn take_object(properties: &mut Properties, key: &str) -> Option<Properties> {
    match properties.remove(key) {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn strip_query(s: &str) -> &str {
    match s.find(|c: char| c == '?' || c == '#') {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Splits a URL into `(host, path)`.
///
/// Without a scheme, the whole input is treated as a path.
pub fn split_url(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            let host_end = rest
                .find(|c: char| c == '/' || c == '?' || c == '#')
                .unwrap_or(rest.len());
            (&rest[..host_end], strip_query(&rest[host_end..]))
        }
        None => ("", strip_query(url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client() -> BrowserClient {
        BrowserClient::new(
            Uuid::from_u128(1),
            DeviceProfile {
                device_type: "Desktop".to_string(),
                os: "Mac OS X".to_string(),
                browser: "Safari".to_string(),
            },
        )
    }

    fn compose(client: &mut BrowserClient, flags: &Properties, properties: Option<Properties>) -> Properties {
        let groups = BTreeMap::from([("account".to_string(), "acc-1".to_string())]);
        let offset = FixedOffset::east_opt(3600).unwrap();
        let context = CaptureContext {
            time: offset.with_ymd_and_hms(2023, 1, 2, 10, 0, 0).unwrap(),
            groups: &groups,
            country_code: "DE",
            feature_flags: flags,
        };
        client.compose(&context, properties)
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("https://hedgebox.net/files/1/?x=1"), ("hedgebox.net", "/files/1/"));
        assert_eq!(split_url("https://www.google.com"), ("www.google.com", ""));
        assert_eq!(split_url("/pricing/"), ("", "/pricing/"));
    }

    #[test]
    fn test_base_properties() {
        let mut client = client();
        client.start_session("session-1".to_string());
        let combined = compose(&mut client, &Properties::new(), None);

        assert_eq!(combined["$distinct_id"], json!(client.device_id()));
        assert_eq!(combined["$lib"], json!("web"));
        assert_eq!(combined["$session_id"], json!("session-1"));
        assert_eq!(combined["$groups"], json!({"account": "acc-1"}));
        assert_eq!(combined["$timestamp"], json!("2023-01-02T10:00:00+01:00"));
        assert_eq!(combined["$time"], json!(1_672_650_000.0));
        assert_eq!(combined["$geoip_country_code"], json!("DE"));
        assert_eq!(combined["$set"], json!({"$geoip_country_code": "DE"}));
        assert!(combined.get("$current_url").is_none());
    }

    #[test]
    fn test_page_context() {
        let mut client = client();
        client.set_current_url(Some("https://hedgebox.net/pricing/".to_string()));
        let combined = compose(&mut client, &Properties::new(), None);

        assert_eq!(combined["$host"], json!("hedgebox.net"));
        assert_eq!(combined["$pathname"], json!("/pricing/"));
    }

    #[test]
    fn test_referrer_split_and_registered() {
        let mut client = client();
        let combined = compose(
            &mut client,
            &Properties::new(),
            Some(props(json!({"$referrer": "https://www.youtube.com/watch?v=1"}))),
        );

        assert_eq!(combined["$referring_domain"], json!("www.youtube.com"));
        assert_eq!(combined["$set"]["$referring_domain"], json!("www.youtube.com"));
        assert_eq!(client.super_properties()["$referrer"], json!("https://www.youtube.com/watch?v=1"));

        // Super properties carry the referrer into later events
        let later = compose(&mut client, &Properties::new(), None);
        assert_eq!(later["$referring_domain"], json!("www.youtube.com"));
    }

    #[test]
    fn test_direct_referrer() {
        let mut client = client();
        let combined = compose(&mut client, &Properties::new(), Some(props(json!({"$referrer": "$direct"}))));
        assert_eq!(combined["$referring_domain"], json!("$direct"));
    }

    #[test]
    fn test_caller_wins_but_decoration_wins_last() {
        let mut client = client();
        let flags = props(json!({"signup-page-4.0": "test"}));
        let combined = compose(
            &mut client,
            &flags,
            Some(props(json!({
                "$lib": "custom",
                "$geoip_country_code": "FR",
                "$feature/signup-page-4.0": "control",
                "$set": {"email": "a@b.c"},
            }))),
        );

        assert_eq!(combined["$lib"], json!("custom"));
        assert_eq!(combined["$geoip_country_code"], json!("DE"));
        assert_eq!(combined["$feature/signup-page-4.0"], json!("test"));
        assert_eq!(combined["$set"], json!({"email": "a@b.c", "$geoip_country_code": "DE"}));
    }

    #[test]
    fn test_identify_links_anonymous_id_once() {
        let mut client = client();
        let device_id = client.device_id().to_string();

        let first = client.identify(Some("user-1"), Properties::new());
        assert_eq!(first["$anon_distinct_id"], json!(device_id));
        assert_eq!(first["$distinct_id"], json!(device_id));
        assert_eq!(client.active_distinct_id(), "user-1");
        assert!(client.is_logged_in());

        let second = client.identify(Some("user-1"), Properties::new());
        assert!(second.get("$anon_distinct_id").is_none());

        client.reset();
        assert_eq!(client.active_distinct_id(), device_id);
        assert!(!client.is_logged_in());
    }

    #[test]
    fn test_identify_without_id_keeps_active_id() {
        let mut client = client();
        let properties = client.identify(None, props(json!({"plan": "pro"})));
        assert_eq!(client.active_distinct_id(), client.device_id());
        assert_eq!(properties["$set"], json!({"plan": "pro"}));
        assert!(properties.get("$user_id").is_none());
    }

    #[test]
    fn test_unregister_absent_key_fails_atomically() {
        let mut client = client();
        client.register(props(json!({"a": 1, "b": 2})));

        let result = client.unregister(&["a", "missing"]);
        assert!(matches!(result, Err(SimError::UnknownSuperProperty(key)) if key == "missing"));
        assert!(client.super_properties().contains_key("a"));

        client.unregister(&["a", "b"]).unwrap();
        assert!(client.super_properties().is_empty());
    }
}
