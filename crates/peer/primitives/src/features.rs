//! SDP-advertised capabilities of a remote message access server.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// `MapSupportedFeatures` SDP attribute bit layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SupportedFeatures: u32 {
        const NOTIFICATION_REGISTRATION = 1 << 0;
        const NOTIFICATION = 1 << 1;
        const BROWSING = 1 << 2;
        const UPLOADING = 1 << 3;
        const DELETE = 1 << 4;
        const INSTANCE_INFORMATION = 1 << 5;
        const EXTENDED_EVENT_REPORT_1_1 = 1 << 6;
        const EVENT_REPORT_1_2 = 1 << 7;
        const MESSAGE_FORMAT_1_1 = 1 << 8;
        const MESSAGES_LISTING_FORMAT_1_1 = 1 << 9;
        const PERSISTENT_MESSAGE_HANDLES = 1 << 10;
        const DATABASE_IDENTIFIER = 1 << 11;
        const FOLDER_VERSION_COUNTER = 1 << 12;
        const CONVERSATION_VERSION_COUNTERS = 1 << 13;
        const PARTICIPANT_PRESENCE_CHANGE = 1 << 14;
        const PARTICIPANT_CHAT_STATE_CHANGE = 1 << 15;
        const PBAP_CONTACT_CROSS_REFERENCE = 1 << 16;
        const NOTIFICATION_FILTERING = 1 << 17;
        const UTC_OFFSET_TIMESTAMP_FORMAT = 1 << 18;
        const SUPPORTED_FEATURES_IN_CONNECT_REQUEST = 1 << 19;
        const CONVERSATION_LISTING = 1 << 20;
        const OWNER_STATUS = 1 << 21;
        const MESSAGE_FORWARDING = 1 << 22;
    }
}

impl Default for SupportedFeatures {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Message types a server instance exposes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MessageTypes: u8 {
        const EMAIL = 1 << 0;
        const SMS_GSM = 1 << 1;
        const SMS_CDMA = 1 << 2;
        const MMS = 1 << 3;
        const IM = 1 << 4;
    }
}

impl Default for MessageTypes {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parsed service record of a message access server instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub instance_id: u8,
    pub name: String,
    /// Profile version, e.g. `0x0104` for 1.4.
    pub profile_version: u16,
    pub message_types: MessageTypes,
    pub supported_features: SupportedFeatures,
}

impl ServiceRecord {
    /// Record with the given raw feature bits; unknown bits are kept.
    pub fn with_feature_bits(instance_id: u8, bits: u32) -> Self {
        Self {
            instance_id,
            supported_features: SupportedFeatures::from_bits_retain(bits),
            ..Default::default()
        }
    }
}
