#![no_main]

use {
    capnwire::{pack, unpack, PackError},
    libfuzzer_sys::fuzz_target,
};

fuzz_target!(|data: &[u8]| {
    // aligned prefix: packing must round-trip and respect the size bound
    let aligned = &data[..data.len() / 8 * 8];
    let packed = pack(aligned).expect("aligned input always packs");
    assert!(
        packed.len() <= aligned.len() + aligned.len().div_ceil(64) + 2,
        "packed {} bytes from {}",
        packed.len(),
        aligned.len()
    );
    let unpacked = unpack(&packed).expect("own output always unpacks");
    assert_eq!(unpacked, aligned);

    if data.len() % 8 != 0 {
        assert_eq!(pack(data), Err(PackError::Misaligned));
    }

    // arbitrary bytes as a packed stream: must never panic, and whatever
    // decodes must re-encode to something decodable
    if let Ok(decoded) = unpack(data) {
        let repacked = pack(&decoded).expect("decoded streams are aligned");
        assert_eq!(unpack(&repacked).unwrap(), decoded);
    }
});
