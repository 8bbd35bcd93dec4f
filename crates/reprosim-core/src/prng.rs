//! PRNG stream setup and state snapshots.
//!
//! One [`SimRng`] is threaded through a whole sweep. Its position can be
//! captured as a [`PrngState`], persisted through the codec as a `uint64`
//! array, and restored later to continue the same stream.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reprosim_codec::{CodecError, DType, TypedArray};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Generator used for every sweep.
pub type SimRng = ChaCha8Rng;

/// Number of `u64` words in an encoded snapshot:
/// four seed words, the stream id, and the 128-bit word position.
const STATE_WORDS: usize = 7;

/// Exact position of a [`SimRng`] within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrngState {
    seed: [u8; 32],
    stream: u64,
    word_pos: u128,
}

impl PrngState {
    /// Snapshot the generator without advancing it.
    pub fn capture(rng: &SimRng) -> Self {
        Self {
            seed: rng.get_seed(),
            stream: rng.get_stream(),
            word_pos: rng.get_word_pos(),
        }
    }

    /// Rebuild a generator positioned exactly where the snapshot was taken.
    pub fn restore(&self) -> SimRng {
        let mut rng = SimRng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }

    pub fn to_array(&self) -> Result<TypedArray, CodecError> {
        let mut words = [0u64; STATE_WORDS];
        for (i, chunk) in self.seed.chunks_exact(8).enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            words[i] = u64::from_le_bytes(bytes);
        }
        words[4] = self.stream;
        words[5] = self.word_pos as u64;
        words[6] = (self.word_pos >> 64) as u64;
        TypedArray::from_u64(vec![STATE_WORDS], &words)
    }

    pub fn from_array(arr: &TypedArray) -> Result<Self, CodecError> {
        if arr.dtype() != DType::UInt64 || arr.shape() != [STATE_WORDS] {
            return Err(CodecError::MalformedArray(format!(
                "PRNG state must be uint64[{STATE_WORDS}], found {}{:?}",
                arr.dtype(),
                arr.shape()
            )));
        }
        let words = arr.to_u64_vec()?;
        let mut seed = [0u8; 32];
        for (i, word) in words[..4].iter().enumerate() {
            seed[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
        }
        Ok(Self {
            seed,
            stream: words[4],
            word_pos: u128::from(words[5]) | (u128::from(words[6]) << 64),
        })
    }
}

impl Serialize for PrngState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_array()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PrngState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let arr = TypedArray::deserialize(deserializer)?;
        Self::from_array(&arr).map_err(serde::de::Error::custom)
    }
}

/// Where a sweep's generator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    /// Fresh stream from an explicit seed.
    Seeded(u64),
    /// Continuation of a previously captured state.
    Resumed,
    /// Entropy-seeded stream; its starting state was captured before any draw.
    Fresh,
}

impl std::fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seeded(seed) => write!(f, "seeded({seed})"),
            Self::Resumed => f.write_str("resumed"),
            Self::Fresh => f.write_str("fresh"),
        }
    }
}

/// A generator ready for a sweep, plus the snapshot it starts from.
#[derive(Debug, Clone)]
pub struct PreparedStream {
    pub rng: SimRng,
    pub origin: StreamOrigin,
    pub initial: PrngState,
}

/// Choose the sweep's generator: a seed wins over a stored state, and with
/// neither a fresh stream is created and snapshotted before any draw.
pub fn prepare_stream(seed: Option<u64>, state: Option<&PrngState>) -> PreparedStream {
    let (rng, origin) = match (seed, state) {
        (Some(seed), _) => (SimRng::seed_from_u64(seed), StreamOrigin::Seeded(seed)),
        (None, Some(state)) => (state.restore(), StreamOrigin::Resumed),
        (None, None) => (SimRng::from_entropy(), StreamOrigin::Fresh),
    };
    let initial = PrngState::capture(&rng);
    tracing::debug!(origin = %origin, word_pos = %initial.word_pos, "prng stream prepared");
    PreparedStream {
        rng,
        origin,
        initial,
    }
}
