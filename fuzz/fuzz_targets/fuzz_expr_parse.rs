#![no_main]

use libfuzzer_sys::fuzz_target;

// Parsing arbitrary text must never panic, and anything that parses must
// re-parse from its own serialized form.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(ast) = weft_expr::parse(source) {
        let text = ast.to_source();
        let _ = weft_expr::parse(&text).expect("serialized form re-parses");
    }
});
