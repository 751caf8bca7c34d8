#![no_main]

use libfuzzer_sys::fuzz_target;
use pcbook::proto::Memory;
use pcbook::store::to_bit;

fuzz_target!(|input: (u64, i32)| {
    let (value, unit) = input;
    let _ = to_bit(Some(&Memory { value, unit }));
});
