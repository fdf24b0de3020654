//! User preferences kept in the local store
//!
//! The theme and the PIN guarding private notes. The PIN is stored as an argon2 hash,
//! a PIN stored in plain text by older versions is accepted once and rehashed.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::local::SharedLocalStore;
use crate::local::keys;
use crate::password;

/// Shortest allowed PIN
pub const MIN_PIN_LENGTH: usize = 4;

/// Longest allowed PIN
pub const MAX_PIN_LENGTH: usize = 8;

/// Color theme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Stored form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// The other theme
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(Error::Storage(format!("Unknown theme `{value}`"))),
        }
    }
}

/// Preferences backed by the local store
#[derive(Clone, Debug)]
pub struct Preferences {
    store: SharedLocalStore,
}

impl Preferences {
    pub fn new(store: SharedLocalStore) -> Self {
        Self { store }
    }

    /// Stored theme, light when absent or unknown
    pub async fn theme(&self) -> Theme {
        let Some(theme) = self.store.get(keys::THEME).await else {
            return Theme::default();
        };

        theme.parse().unwrap_or_else(|err| {
            tracing::warn!("Ignoring stored theme: {err}");
            Theme::default()
        })
    }

    /// Store a theme
    ///
    /// # Errors
    ///
    /// Will return `Err` when the local store fails
    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.set(keys::THEME, theme.as_str()).await
    }

    /// Switch to the other theme and return it
    ///
    /// # Errors
    ///
    /// Will return `Err` when the local store fails
    pub async fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.theme().await.toggled();
        self.set_theme(theme).await?;

        Ok(theme)
    }

    /// Is a PIN set?
    pub async fn has_pin(&self) -> bool {
        self.store.get(keys::PIN).await.is_some()
    }

    /// Set the PIN, replacing any previous one
    ///
    /// # Errors
    ///
    /// Will return [`Error::InvalidPin`] when the PIN is not 4 to 8 digits
    pub async fn set_pin(&self, pin: &str) -> Result<()> {
        validate_pin(pin)?;

        let hashed = password::hash(pin)?;
        self.store.set(keys::PIN, &hashed).await?;

        tracing::debug!("PIN set");

        Ok(())
    }

    /// Check a PIN against the stored one
    ///
    /// Without a stored PIN nothing verifies
    ///
    /// # Errors
    ///
    /// Will return `Err` when a legacy PIN matched but could not be rehashed
    pub async fn verify_pin(&self, pin: &str) -> Result<bool> {
        let Some(stored) = self.store.get(keys::PIN).await else {
            return Ok(false);
        };

        if password::is_hash(&stored) {
            return Ok(password::verify(&stored, pin));
        }

        if stored != pin {
            return Ok(false);
        }

        tracing::info!("Rehashing PIN stored in plain text");

        let hashed = password::hash(pin)?;
        self.store.set(keys::PIN, &hashed).await?;

        Ok(true)
    }

    /// Remove the PIN
    ///
    /// # Errors
    ///
    /// Will return `Err` when the local store fails
    pub async fn clear_pin(&self) -> Result<()> {
        self.store.remove(keys::PIN).await
    }
}

fn validate_pin(pin: &str) -> Result<()> {
    let valid = (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&pin.len())
        && pin.bytes().all(|byte| byte.is_ascii_digit());

    if valid { Ok(()) } else { Err(Error::InvalidPin) }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::local::Memory;

    use super::*;

    fn preferences() -> (Preferences, SharedLocalStore) {
        let store: SharedLocalStore = Arc::new(Memory::default());

        (Preferences::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_theme_defaults_to_light() {
        let (preferences, store) = preferences();

        assert_eq!(Theme::Light, preferences.theme().await);

        store.set(keys::THEME, "sepia").await.unwrap();
        assert_eq!(Theme::Light, preferences.theme().await);
    }

    #[tokio::test]
    async fn test_toggle_theme() {
        let (preferences, store) = preferences();

        assert_eq!(Theme::Dark, preferences.toggle_theme().await.unwrap());
        assert_eq!(Some("dark".to_string()), store.get(keys::THEME).await);
        assert_eq!(Theme::Light, preferences.toggle_theme().await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_is_hashed() {
        let (preferences, store) = preferences();

        assert!(!preferences.has_pin().await);
        assert!(!preferences.verify_pin("1234").await.unwrap());

        preferences.set_pin("1234").await.unwrap();

        let stored = store.get(keys::PIN).await.unwrap();
        assert_ne!("1234", stored);
        assert!(password::is_hash(&stored));

        assert!(preferences.has_pin().await);
        assert!(preferences.verify_pin("1234").await.unwrap());
        assert!(!preferences.verify_pin("4321").await.unwrap());

        preferences.clear_pin().await.unwrap();
        assert!(!preferences.has_pin().await);
    }

    #[tokio::test]
    async fn test_invalid_pins() {
        let (preferences, _) = preferences();

        for pin in ["", "123", "123456789", "12a4", "１２３４"] {
            assert!(matches!(
                preferences.set_pin(pin).await,
                Err(Error::InvalidPin)
            ));
        }

        assert!(!preferences.has_pin().await);
    }

    #[tokio::test]
    async fn test_plain_pin_is_rehashed() {
        let (preferences, store) = preferences();

        store.set(keys::PIN, "2468").await.unwrap();

        assert!(!preferences.verify_pin("1357").await.unwrap());
        assert_eq!(Some("2468".to_string()), store.get(keys::PIN).await);

        assert!(preferences.verify_pin("2468").await.unwrap());

        let stored = store.get(keys::PIN).await.unwrap();
        assert!(password::is_hash(&stored));
        assert!(preferences.verify_pin("2468").await.unwrap());
    }
}
