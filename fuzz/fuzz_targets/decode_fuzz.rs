#![no_main]
use libfuzzer_sys::fuzz_target;
use octamap::format::header::HEADER_SIZE;
use octamap::map::{decode_all, encode_all};
use octamap::world::World;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors or damaged reports.
    let _ = decode_all(data);

    // Most inputs die at the magic check, so also feed them behind a
    // valid header.
    let mut stream = encode_all(&World::new(1024), false).unwrap();
    stream.truncate(HEADER_SIZE);
    stream.extend_from_slice(data);
    let _ = decode_all(&stream);
});
