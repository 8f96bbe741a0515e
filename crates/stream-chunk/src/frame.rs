use crate::Error;

const UNKNOWN_TOTAL: &str = "???";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartTotal {
    Known(usize),
    /// The sender had not finished splitting when it emitted this fragment.
    Unknown,
}

impl PartTotal {
    pub fn known(self) -> Option<usize> {
        match self {
            Self::Known(total) => Some(total),
            Self::Unknown => None,
        }
    }
}

/// One `messageId|partIndex|partTotal|payload` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub message_id: &'a str,
    pub index: usize,
    pub total: PartTotal,
    pub payload: &'a str,
}

impl<'a> Fragment<'a> {
    pub fn parse(frame: &'a str) -> Result<Self, Error> {
        let fields: Vec<&str> = frame.splitn(4, '|').collect();
        let [message_id, index, total, payload] = fields[..] else {
            return Err(Error::MissingFields(fields.len()));
        };

        if message_id.is_empty() {
            return Err(Error::EmptyMessageId);
        }

        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::InvalidPartIndex(index.to_string()))?;

        let total = match total.trim() {
            UNKNOWN_TOTAL => PartTotal::Unknown,
            raw => match raw.parse::<usize>() {
                Ok(0) | Err(_) => return Err(Error::InvalidPartTotal(raw.to_string())),
                Ok(n) => PartTotal::Known(n),
            },
        };

        if let PartTotal::Known(total) = total
            && index >= total
        {
            return Err(Error::PartOutOfRange { index, total });
        }

        Ok(Self {
            message_id,
            index,
            total,
            payload: payload.trim(),
        })
    }
}
