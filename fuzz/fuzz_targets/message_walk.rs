#![no_main]

use {
    capnwire::{from_bytes, Message, Ptr, PtrKind},
    libfuzzer_sys::fuzz_target,
};

/// Visit every reachable object, exercising each read path. Bounded by
/// depth and fanout so hostile inputs cannot stall the fuzzer.
fn walk(msg: &Message, p: Ptr, depth: u32) {
    if depth == 0 {
        return;
    }
    match p.kind() {
        PtrKind::Null => {}
        PtrKind::Struct => {
            let _ = msg.read8(p, 0);
            let _ = msg.read64(p, p.data_size().saturating_sub(8));
            let _ = msg.read_f64(p, 0, 1.5);
            for slot in 0..p.ptr_count().min(32) {
                let _ = msg.get_text(p, slot);
                let _ = msg.get_data(p, slot);
                walk(msg, msg.getp(p, slot), depth - 1);
            }
        }
        PtrKind::List => {
            let mut buf = [0u8; 64];
            let _ = msg.getv8(p, 0, &mut buf);
            for i in 0..p.size().min(32) {
                let _ = msg.get8(p, i);
                let _ = msg.get64(p, i);
                walk(msg, msg.getp(p, i), depth - 1);
            }
        }
        PtrKind::PtrList => {
            for i in 0..p.size().min(32) {
                walk(msg, msg.getp(p, i), depth - 1);
            }
        }
        PtrKind::BitList => {
            let mut buf = [0u8; 16];
            let _ = msg.getv1(p, 0, &mut buf);
            let _ = msg.get1(p, p.size().saturating_sub(1));
        }
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = from_bytes(data) {
        walk(&msg, msg.get_root(), 6);
    }
});
