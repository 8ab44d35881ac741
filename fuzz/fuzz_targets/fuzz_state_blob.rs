#![no_main]
use libfuzzer_sys::fuzz_target;
use softbody_scheduler::netcode::RemoteState;

// Fuzz the state blob decoder with arbitrary bytes.
// Must never panic; anything it accepts must re-encode to the same bytes.
fuzz_target!(|data: &[u8]| {
    if let Ok(state) = RemoteState::from_bytes(data) {
        assert_eq!(state.encoded_len(), data.len());
        assert_eq!(state.to_bytes(), data);
    }
});
