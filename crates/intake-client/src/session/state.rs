use intake_core::SessionId;

pub const RESET_NOTICE: &str = "Your session could not be verified. A new session will be started.";
pub const COLLISION_NOTICE: &str = "Your session id was already in use. A new one has been issued.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server issued or accepted this id.
    Confirmed(SessionId),
    /// Generated locally while the server was unreachable; claimed with
    /// `fresh = true` on the next validation.
    Provisional(SessionId),
    /// The server rejected `previous` and issued `replacement`.
    Replaced {
        previous: SessionId,
        replacement: SessionId,
    },
    /// Identity lost or tampered with. Everything tied to the old id is dropped.
    Reset,
}

/// Client-side session identity.
///
/// `generation` changes whenever the id does; anything built for an older
/// generation (an upload batch, a half-filled form) must be thrown away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    id: Option<SessionId>,
    confirmed: bool,
    generation: u64,
    notice: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    /// True when the server holds a row for the id (`reserved` or later).
    pub fn is_bound(&self) -> bool {
        self.id.is_some() && self.confirmed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Message to show after a reset or replacement.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Confirmed(id) => {
                self.set_id(id);
                self.confirmed = true;
                true
            }
            SessionEvent::Provisional(id) => {
                self.set_id(id);
                self.confirmed = false;
                true
            }
            SessionEvent::Replaced {
                previous,
                replacement,
            } => {
                if self.id.is_some_and(|current| current != previous) {
                    return false;
                }
                self.set_id(replacement);
                self.confirmed = true;
                self.notice = Some(COLLISION_NOTICE.to_string());
                true
            }
            SessionEvent::Reset => {
                self.id = None;
                self.confirmed = false;
                self.generation += 1;
                self.notice = Some(RESET_NOTICE.to_string());
                true
            }
        }
    }

    /// Hard reset, as on a page reload with a lost identity.
    pub fn reinitialize(&mut self) {
        self.apply(SessionEvent::Reset);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    fn set_id(&mut self, id: SessionId) {
        if self.id != Some(id) {
            self.id = Some(id);
            self.generation += 1;
        }
    }
}
