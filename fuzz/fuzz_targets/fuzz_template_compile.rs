#![no_main]

use libfuzzer_sys::fuzz_target;

// Compiling arbitrary text must either produce a forest or a structured
// error, never panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = weft_template::compile(source);
    }
});
