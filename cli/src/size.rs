peg::parser!(grammar size() for str {
    rule dec() -> u64
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("decimal number")) }
        / expected!("number")
    rule hex() -> u64
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9'|'a'..='f'|'A'..='F']+})
        {? u64::from_str_radix(n, 16).or(Err("hexadecimal number")) }
    rule unit() -> u64
        = ['k' | 'K'] "i"? ['b' | 'B']? { 1 << 10 }
        / ['m' | 'M'] "i"? ['b' | 'B']? { 1 << 20 }
        / ['g' | 'G'] "i"? ['b' | 'B']? { 1 << 30 }
        / ['b' | 'B']? { 1 }
    rule _() = quiet!{[' ' | '\t']*}

    // `4096`, `0x1000`, `4K`, `4 KiB`, `1M`
    pub(crate) rule bytes() -> u64
        = _ n:(hex() / dec()) _ u:unit() _ {? n.checked_mul(u).ok_or("size that fits in 64 bits") }
});

/// parses a size literal into a byte count.
pub(crate) fn parse_size(s: &str) -> Result<u32, String> {
    let bytes = size::bytes(s).map_err(|e| format!("invalid size `{s}`: {e}"))?;
    u32::try_from(bytes).map_err(|_| format!("size `{s}` ({bytes} bytes) does not fit in 32 bits"))
}

/// parses a plain decimal number.
pub(crate) fn parse_u32(s: &str) -> Result<u32, String> {
    s.trim().parse().map_err(|e| format!("invalid number `{s}`: {e}"))
}
