#![no_main]
use libfuzzer_sys::fuzz_target;
use octamap::map::{decode_all, encode_all};

fuzz_target!(|data: &[u8]| {
    // Anything that decodes cleanly must re-encode to a stream that is
    // stable from the second generation on.
    let Ok(first) = decode_all(data) else {
        return;
    };
    if first.report.failed {
        return;
    }
    let bare = data.first().is_some_and(|b| b & 1 != 0);
    let Ok(once) = encode_all(&first.world, bare) else {
        return;
    };
    let second = decode_all(&once).unwrap();
    assert!(!second.report.failed);
    let twice = encode_all(&second.world, bare).unwrap();
    let third = decode_all(&twice).unwrap();
    assert_eq!(encode_all(&third.world, bare).unwrap(), twice);
});
