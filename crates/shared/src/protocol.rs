use serde::{Deserialize, Serialize};

use crate::domain::{KanjiId, KanjiRecord};

/// Payload of `GET /api/kanjis`.
///
/// Older backends answer with a bare array of records; both shapes decode into
/// this type, the bare form reporting its own length as `total_pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReviewBatchWire")]
pub struct ReviewBatchResponse {
    pub kanjis: Vec<KanjiRecord>,
    pub total_pending: u32,
}

impl ReviewBatchResponse {
    pub fn new(kanjis: Vec<KanjiRecord>, total_pending: u32) -> Self {
        Self {
            kanjis,
            total_pending,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.kanjis.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReviewBatchWire {
    Envelope {
        kanjis: Vec<KanjiRecord>,
        #[serde(default)]
        total_pending: Option<u32>,
    },
    Bare(Vec<KanjiRecord>),
}

impl From<ReviewBatchWire> for ReviewBatchResponse {
    fn from(value: ReviewBatchWire) -> Self {
        match value {
            ReviewBatchWire::Envelope {
                kanjis,
                total_pending,
            } => {
                let total_pending = total_pending.unwrap_or(kanjis.len() as u32);
                Self {
                    kanjis,
                    total_pending,
                }
            }
            ReviewBatchWire::Bare(kanjis) => {
                let total_pending = kanjis.len() as u32;
                Self {
                    kanjis,
                    total_pending,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiAnswer {
    pub kanji_id: KanjiId,
    pub incorrect_streak: u32,
}

/// Payload of `POST /api/answers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<KanjiAnswer>,
}

/// Telegram login widget payload accepted by `POST /api/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramCredential {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
