//! Device bring-up
//!
//! Initialization runs in three phases that only move forward:
//!
//! 1. Handshake: enable notifications and authenticate. The random number challenge is answered
//!    through an external [`AuthCipher`]; any failure here is fatal for the session.
//! 2. Query: enable the remaining notifications and read device info and battery.
//! 3. Configure: push every user setting the device has a characteristic for.
//!
//! Failures in phases 2 and 3 are logged and the session still becomes initialized, a partially
//! configured band is usable.

use crate::capability::DeviceCapability;
use crate::config::DeviceSettings;
use crate::service::*;
use crate::settings::{append_setting, INITIAL_SETTINGS};
use crate::transport::{lookup, BleSupport, CharacteristicHandle, Transaction};
use crate::types::{hex_dump, HuamiError, Result};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

const AUTH_KEY_LENGTH: usize = 16;
const AUTH_RANDOM_OFFSET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitializationPhase {
    Phase1Handshake,
    Phase2Query,
    Phase3Configure,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotInitialized,
    Initializing(InitializationPhase),
    Initialized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::NotInitialized => write!(f, "NOT_INITIALIZED"),
            SessionState::Initializing(phase) => write!(f, "INITIALIZING({:?})", phase),
            SessionState::Initialized => write!(f, "INITIALIZED"),
        }
    }
}

/// Key material and cipher used to answer the band's challenge
#[async_trait::async_trait]
pub trait AuthCipher: Send + Sync {
    /// Shared secret sent when pairing for the first time
    fn secret_key(&self) -> [u8; AUTH_KEY_LENGTH];

    /// Encrypt the 16 byte random number sent by the band
    async fn encrypt(&self, random: &[u8]) -> Result<Vec<u8>>;
}

/// Per-connection authentication parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthParams {
    /// First connection to this band, the secret key has to be sent
    pub needs_auth: bool,
    pub auth_flags: u8,
    pub crypt_flags: u8,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            needs_auth: false,
            auth_flags: AUTH_BYTE,
            crypt_flags: 0x00,
        }
    }
}

/// Result of handling one auth notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProgress {
    Pending,
    Authenticated,
}

pub struct InitializationSequencer {
    state: SessionState,
    params: AuthParams,
    cipher: Arc<dyn AuthCipher>,
}

impl InitializationSequencer {
    pub fn new(cipher: Arc<dyn AuthCipher>, params: AuthParams) -> Self {
        Self {
            state: SessionState::NotInitialized,
            params,
            cipher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    fn in_handshake(&self) -> bool {
        self.state == SessionState::Initializing(InitializationPhase::Phase1Handshake)
    }

    fn fail(&mut self, reason: String) -> HuamiError {
        error!("Initialization failed: {}", reason);
        self.state = SessionState::NotInitialized;
        HuamiError::Fatal(reason)
    }

    fn auth_characteristic(&mut self, ble: &dyn BleSupport) -> Result<CharacteristicHandle> {
        match lookup(ble, Characteristic::Auth) {
            Some(handle) => Ok(handle),
            None => Err(self.fail("auth characteristic missing".to_string())),
        }
    }

    fn request_random_number(&self) -> Vec<u8> {
        if self.params.crypt_flags == 0 {
            vec![AUTH_REQUEST_RANDOM_AUTH_NUMBER, self.params.auth_flags]
        } else {
            vec![
                self.params.crypt_flags | AUTH_REQUEST_RANDOM_AUTH_NUMBER,
                self.params.auth_flags,
                0x02,
                0x01,
                0x00,
            ]
        }
    }

    async fn queue_auth_write(&mut self, ble: &dyn BleSupport, name: &str, data: &[u8]) -> Result<()> {
        let auth = self.auth_characteristic(ble)?;
        let mut tx = Transaction::new(name);
        tx.write(&auth, data);
        if let Err(e) = ble.queue(tx).await {
            return Err(self.fail(format!("{}: {}", name, e)));
        }
        Ok(())
    }

    /// Phase 1: enable notifications and start authentication
    pub async fn begin(&mut self, ble: &dyn BleSupport) -> Result<()> {
        info!("Initializing Huami device");
        self.state = SessionState::Initializing(InitializationPhase::Phase1Handshake);

        let auth = self.auth_characteristic(ble)?;
        let authenticate = self.params.needs_auth && self.params.crypt_flags == 0;
        self.params.needs_auth = false;

        let mut tx = Transaction::new("initialize: handshake");
        for characteristic in [Characteristic::Notification, Characteristic::CurrentTime] {
            if let Some(handle) = lookup(ble, characteristic) {
                tx.notify(&handle, true);
            }
        }
        tx.notify(&auth, true);

        if authenticate {
            debug!("Sending secret key");
            let mut command = vec![AUTH_SEND_KEY, self.params.auth_flags];
            command.extend_from_slice(&self.cipher.secret_key());
            tx.write(&auth, &command);
        } else {
            tx.write(&auth, &self.request_random_number());
        }

        if let Err(e) = ble.queue(tx).await {
            return Err(self.fail(format!("handshake not queued: {}", e)));
        }
        Ok(())
    }

    /// Handle a notification from the auth characteristic
    pub async fn on_auth_notification(
        &mut self,
        ble: &dyn BleSupport,
        value: &[u8],
    ) -> Result<AuthProgress> {
        debug!("Auth notification: {}", hex_dump(value));
        if !self.in_handshake() {
            warn!(
                "Ignoring auth notification while {}: {}",
                self.state,
                hex_dump(value)
            );
            return Ok(AuthProgress::Pending);
        }
        if value.len() < 3 || value[0] != AUTH_RESPONSE {
            warn!("Unexpected auth notification: {}", hex_dump(value));
            return Ok(AuthProgress::Pending);
        }
        if value[2] != AUTH_SUCCESS {
            return Err(self.fail(format!(
                "auth step 0x{:02X} rejected with status 0x{:02X}",
                value[1], value[2]
            )));
        }

        match value[1] & 0x0f {
            AUTH_SEND_KEY => {
                info!("Secret key accepted");
                let request = self.request_random_number();
                self.queue_auth_write(ble, "auth: request random", &request)
                    .await?;
                Ok(AuthProgress::Pending)
            }
            AUTH_REQUEST_RANDOM_AUTH_NUMBER => {
                let end = AUTH_RANDOM_OFFSET + AUTH_KEY_LENGTH;
                if value.len() < end {
                    return Err(self.fail(format!(
                        "random number too short: {} bytes",
                        value.len()
                    )));
                }
                let result = self.cipher.encrypt(&value[AUTH_RANDOM_OFFSET..end]).await;
                let encrypted = match result {
                    Ok(encrypted) => encrypted,
                    Err(e) => return Err(self.fail(format!("encryption failed: {}", e))),
                };
                let mut command = vec![
                    AUTH_SEND_ENCRYPTED_AUTH_NUMBER | self.params.crypt_flags,
                    self.params.auth_flags,
                ];
                command.extend_from_slice(&encrypted);
                self.queue_auth_write(ble, "auth: send encrypted", &command)
                    .await?;
                Ok(AuthProgress::Pending)
            }
            AUTH_SEND_ENCRYPTED_AUTH_NUMBER => {
                info!("Authenticated");
                Ok(AuthProgress::Authenticated)
            }
            other => {
                warn!("Unknown auth step 0x{:02X}", other);
                Ok(AuthProgress::Pending)
            }
        }
    }

    /// Phases 2 and 3, run once authenticated
    ///
    /// Only valid while the handshake is in progress; in any other state nothing is queued.
    pub async fn complete(
        &mut self,
        ble: &dyn BleSupport,
        settings: &DeviceSettings,
        capability: &DeviceCapability,
    ) -> Result<()> {
        if !self.in_handshake() {
            return Err(HuamiError::PreconditionNotMet(format!(
                "cannot configure device while {}",
                self.state
            )));
        }
        self.state = SessionState::Initializing(InitializationPhase::Phase2Query);
        if let Err(e) = ble.queue(query_transaction(ble)).await {
            error!("Device query failed: {}", e);
        }

        self.state = SessionState::Initializing(InitializationPhase::Phase3Configure);
        let configure = configure_transaction(ble, settings, capability);
        if !configure.is_empty() {
            if let Err(e) = ble.queue(configure).await {
                error!("Device configuration failed: {}", e);
            }
        }

        self.state = SessionState::Initialized;
        info!("Huami device initialized");
        Ok(())
    }
}

fn query_transaction(ble: &dyn BleSupport) -> Transaction {
    info!("Querying device");
    let mut tx = Transaction::new("initialize: query");
    for characteristic in [
        Characteristic::Configuration,
        Characteristic::BatteryInfo,
        Characteristic::DeviceEvent,
        Characteristic::Audio,
        Characteristic::AudioData,
    ] {
        if let Some(handle) = lookup(ble, characteristic) {
            tx.notify(&handle, true);
        }
    }
    for characteristic in [
        Characteristic::HardwareRevision,
        Characteristic::FirmwareRevision,
        Characteristic::SoftwareRevision,
        Characteristic::BatteryInfo,
    ] {
        if let Some(handle) = lookup(ble, characteristic) {
            tx.read(&handle);
        }
    }
    tx
}

fn configure_transaction(
    ble: &dyn BleSupport,
    settings: &DeviceSettings,
    capability: &DeviceCapability,
) -> Transaction {
    info!("Configuring device");
    let mut tx = Transaction::new("initialize: configure");
    for key in INITIAL_SETTINGS {
        match append_setting(&mut tx, ble, settings, capability, key) {
            Ok(()) => {}
            Err(HuamiError::Unsupported(reason)) => debug!("Skipping {}: {}", key, reason),
            Err(e) => warn!("Skipping {}: {}", key, e),
        }
    }
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DeviceFamily;
    use crate::transport::testing::MockBleSupport;
    use crate::transport::TransportOp;
    use crate::user::{Gender, UserProfile};

    struct XorCipher {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl AuthCipher for XorCipher {
        fn secret_key(&self) -> [u8; 16] {
            [0x30; 16]
        }

        async fn encrypt(&self, random: &[u8]) -> Result<Vec<u8>> {
            if self.fail {
                return Err(HuamiError::InvalidArgument("bad key".to_string()));
            }
            Ok(random.iter().map(|b| b ^ 0x30).collect())
        }
    }

    fn sequencer(needs_auth: bool, fail: bool) -> InitializationSequencer {
        let _ = env_logger::builder().is_test(true).try_init();
        InitializationSequencer::new(
            Arc::new(XorCipher { fail }),
            AuthParams {
                needs_auth,
                ..AuthParams::default()
            },
        )
    }

    fn capability() -> DeviceCapability {
        DeviceCapability::new(DeviceFamily::AmazfitBip, "0.1.1.14", "0.75.19.3").unwrap()
    }

    fn settings() -> DeviceSettings {
        DeviceSettings {
            user: UserProfile {
                alias: Some("mi1".to_string()),
                birth_year: 1985,
                gender: Gender::Female,
                height_cm: 170,
                weight_kg: 60,
            },
            ..DeviceSettings::default()
        }
    }

    fn random_challenge() -> Vec<u8> {
        let mut value = vec![0x10, 0x02, 0x01];
        value.extend(0..16u8);
        value
    }

    #[tokio::test]
    async fn test_first_pairing_flow() {
        let ble = MockBleSupport::new();
        let mut seq = sequencer(true, false);

        seq.begin(&ble).await.unwrap();
        assert_eq!(
            seq.state(),
            SessionState::Initializing(InitializationPhase::Phase1Handshake)
        );
        let writes = ble.executed_writes();
        assert_eq!(writes[0].0, Characteristic::Auth);
        assert_eq!(&writes[0].1[..2], &[0x01, 0x00]);
        assert_eq!(writes[0].1.len(), 18);

        let progress = seq.on_auth_notification(&ble, &[0x10, 0x01, 0x01]).await.unwrap();
        assert_eq!(progress, AuthProgress::Pending);
        assert_eq!(ble.executed_writes()[1].1, vec![0x02, 0x00]);

        seq.on_auth_notification(&ble, &random_challenge()).await.unwrap();
        let answer = &ble.executed_writes()[2].1;
        assert_eq!(&answer[..2], &[0x03, 0x00]);
        assert_eq!(answer[2], 0x30);
        assert_eq!(answer.len(), 18);

        let progress = seq.on_auth_notification(&ble, &[0x10, 0x03, 0x01]).await.unwrap();
        assert_eq!(progress, AuthProgress::Authenticated);
    }

    #[tokio::test]
    async fn test_reconnect_requests_random_number() {
        let ble = MockBleSupport::new();
        let mut seq = sequencer(false, false);
        seq.begin(&ble).await.unwrap();

        let tx = &ble.queued()[0];
        let notifies = tx
            .ops()
            .iter()
            .filter(|op| matches!(op, TransportOp::Notify { enable: true, .. }))
            .count();
        assert_eq!(notifies, 3);
        assert_eq!(ble.executed_writes(), vec![(Characteristic::Auth, vec![0x02, 0x00])]);
    }

    #[tokio::test]
    async fn test_crypt_flags_request() {
        let ble = MockBleSupport::new();
        let mut seq = InitializationSequencer::new(
            Arc::new(XorCipher { fail: false }),
            AuthParams {
                needs_auth: true,
                auth_flags: 0x00,
                crypt_flags: 0x80,
            },
        );
        seq.begin(&ble).await.unwrap();
        assert_eq!(ble.executed_writes()[0].1, vec![0x82, 0x00, 0x02, 0x01, 0x00]);

        seq.on_auth_notification(&ble, &random_challenge()).await.unwrap();
        assert_eq!(ble.executed_writes()[1].1[0], 0x83);
    }

    #[tokio::test]
    async fn test_phase1_failure_is_fatal() {
        let ble = MockBleSupport::new();
        ble.fail_on("handshake");
        let mut seq = sequencer(true, false);

        let err = seq.begin(&ble).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(seq.state(), SessionState::NotInitialized);
        assert!(ble.queued().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_auth_and_cipher_failure() {
        let ble = MockBleSupport::new();
        let mut seq = sequencer(true, false);
        seq.begin(&ble).await.unwrap();
        let err = seq
            .on_auth_notification(&ble, &[0x10, 0x01, 0x04])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(seq.state(), SessionState::NotInitialized);

        let mut seq = sequencer(false, true);
        seq.begin(&ble).await.unwrap();
        let err = seq
            .on_auth_notification(&ble, &random_challenge())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!seq.is_initialized());
    }

    #[tokio::test]
    async fn test_complete_queries_and_configures() {
        let ble = MockBleSupport::without(&[Characteristic::HeartRateControlPoint]);
        let mut seq = sequencer(false, false);
        seq.begin(&MockBleSupport::new()).await.unwrap();
        seq.complete(&ble, &settings(), &capability()).await.unwrap();

        assert!(seq.is_initialized());
        assert_eq!(
            ble.queued_names(),
            vec!["initialize: query", "initialize: configure"]
        );

        let query = &ble.queued()[0];
        let reads = query
            .ops()
            .iter()
            .filter(|op| matches!(op, TransportOp::Read { .. }))
            .count();
        assert_eq!(reads, 4);

        let writes = ble.executed_writes();
        // date display, then time format
        assert_eq!(writes[0].1, DATEFORMAT_DATE_TIME.to_vec());
        assert_eq!(writes[1].1, DATEFORMAT_TIME_24_HOURS.to_vec());
        assert_eq!(writes[2].1[0], COMMAND_SET_USERINFO);
        assert!(writes
            .iter()
            .all(|(c, _)| *c != Characteristic::HeartRateControlPoint));
        // 17 settings minus the two heart rate control point ones
        assert_eq!(writes.len(), 15);
    }

    #[tokio::test]
    async fn test_incomplete_profile_is_skipped() {
        let ble = MockBleSupport::new();
        ble.fail_on("query");
        let mut seq = sequencer(false, false);
        seq.begin(&MockBleSupport::new()).await.unwrap();
        seq.complete(&ble, &DeviceSettings::default(), &capability())
            .await
            .unwrap();

        assert!(seq.is_initialized());
        let writes = ble.executed_writes();
        assert!(writes.iter().all(|(_, data)| data[0] != COMMAND_SET_USERINFO));
        assert_eq!(writes.len(), 16);
    }

    #[tokio::test]
    async fn test_auth_ignored_outside_handshake() {
        let ble = MockBleSupport::new();
        ble.fail_on("handshake");
        let mut seq = sequencer(false, false);
        assert!(seq.begin(&ble).await.is_err());

        let progress = seq.on_auth_notification(&ble, &[0x10, 0x03, 0x01]).await.unwrap();
        assert_eq!(progress, AuthProgress::Pending);
        assert!(matches!(
            seq.complete(&ble, &settings(), &capability()).await,
            Err(HuamiError::PreconditionNotMet(_))
        ));
        assert_eq!(seq.state(), SessionState::NotInitialized);
        assert!(ble.queued().is_empty());
    }

    #[tokio::test]
    async fn test_complete_runs_once() {
        let ble = MockBleSupport::new();
        let mut seq = sequencer(false, false);
        seq.begin(&ble).await.unwrap();
        seq.complete(&ble, &settings(), &capability()).await.unwrap();
        let queued = ble.queued().len();

        let progress = seq.on_auth_notification(&ble, &[0x10, 0x03, 0x01]).await.unwrap();
        assert_eq!(progress, AuthProgress::Pending);
        assert!(seq.complete(&ble, &settings(), &capability()).await.is_err());
        assert!(seq.is_initialized());
        assert_eq!(ble.queued().len(), queued);
    }
}
