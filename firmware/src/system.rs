//! Device-wide singletons shared by the runtime tasks.
use crate::vault::Confirmation;

static CONFIRMATION: Confirmation = Confirmation::new();

/// The confirmation gate every link and the dispatcher share.
pub fn confirmation() -> &'static Confirmation {
    &CONFIRMATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::State;

    #[test]
    fn confirmation_is_a_single_instance() {
        assert!(core::ptr::eq(confirmation(), confirmation()));
        assert_eq!(confirmation().state(), State::Idle);
    }
}
