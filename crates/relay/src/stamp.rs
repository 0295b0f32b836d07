use rand::{RngCore, rngs::OsRng};

const ID_PREFIX: &str = "genai-";
const ID_BYTES: usize = 6;

/// Identity of one outbound OpenAI-shaped response: its id and creation time.
///
/// Converters take a stamp instead of drawing randomness and reading the clock
/// themselves, so their output is deterministic under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseStamp {
    pub(crate) id: String,
    pub(crate) created: i64,
}

impl ResponseStamp {
    /// A stamp with an id from the OS random source and the current time.
    pub(crate) fn fresh() -> Self {
        Self {
            id: response_id(&mut OsRng),
            created: jiff::Timestamp::now().as_second(),
        }
    }

    #[cfg(test)]
    pub(crate) fn fixed(id: &str, created: i64) -> Self {
        Self {
            id: id.to_string(),
            created,
        }
    }
}

/// Builds `genai-` followed by 12 hex characters.
///
/// A failing random source yields the bare prefix rather than an error.
pub(crate) fn response_id(rng: &mut impl RngCore) -> String {
    let mut bytes = [0u8; ID_BYTES];

    if let Err(e) = rng.try_fill_bytes(&mut bytes) {
        log::warn!("Random source failed, response id left without a token: {e}");
        return ID_PREFIX.to_string();
    }

    let mut id = String::with_capacity(ID_PREFIX.len() + ID_BYTES * 2);
    id.push_str(ID_PREFIX);

    for byte in bytes {
        id.push_str(&format!("{byte:02x}"));
    }

    id
}
