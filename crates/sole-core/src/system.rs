use std::sync::OnceLock;

static INSTANCE_ID: OnceLock<String> = OnceLock::new();

/// Stable identifier of this process within the fleet.
///
/// Hostname when it is available and valid UTF-8, otherwise a random UUID.
pub fn instance_id() -> &'static str {
    INSTANCE_ID.get_or_init(|| {
        if let Ok(hostname) = hostname::get()
            && let Some(name) = hostname.to_str()
            && !name.is_empty()
        {
            return name.to_string();
        }
        uuid::Uuid::new_v4().to_string()
    })
}
