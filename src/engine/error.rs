use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Candidate period overlaps the given live booking.
    Conflict(Ulid),
    /// Room is deactivated or not reservable.
    RoomNotBookable(Ulid),
    /// Operation requires a tentative booking.
    NotTentative(Ulid),
    /// Tentative booking passed its lapse deadline.
    TentativeLapsed(Ulid),
    /// Booking is already cancelled or rejected.
    AlreadyClosed(Ulid),
    /// Excluded days only apply to repeating series.
    NotRepeating(Ulid),
    InvalidSeries(&'static str),
    InvalidNegotiation(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::RoomNotBookable(id) => {
                write!(f, "room {id} is deactivated or not reservable")
            }
            EngineError::NotTentative(id) => write!(f, "booking {id} is not tentative"),
            EngineError::TentativeLapsed(id) => {
                write!(f, "tentative booking {id} passed its lapse deadline")
            }
            EngineError::AlreadyClosed(id) => {
                write!(f, "booking {id} is already cancelled or rejected")
            }
            EngineError::NotRepeating(id) => {
                write!(f, "booking {id} does not repeat; excluded days not applicable")
            }
            EngineError::InvalidSeries(msg) => write!(f, "invalid series: {msg}"),
            EngineError::InvalidNegotiation(msg) => write!(f, "invalid negotiation: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
