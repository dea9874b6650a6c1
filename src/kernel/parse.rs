//! Record parser for the kernel definition format.
//!
//! Grammar, per record:
//!
//! ```text
//! <name> <w> <h> <cx> <cy> { <w*h weights> } <divisor|auto> <bias|auto> <targets>
//! ```
//!
//! Weights and an explicit divisor are floats, scaled by [`PRECISION`] into
//! fixed point; an explicit bias is used as-is. `auto` (case-insensitive)
//! resolves divisor and bias from the raw weight sum:
//!
//! | weight sum | divisor | bias |
//! |-----------:|---------|------|
//! | positive | the sum | 0 |
//! | zero | `PRECISION` | 128 |
//! | negative | |sum| | 255 |
//!
//! A malformed record is discarded whole, with no partial insertion, and
//! parsing resumes at the next record where feasible: the parser skips
//! through the record's closing `}` and its three trailing tokens. A record
//! broken before any `{` with no brace left in the source consumes the rest
//! of that source.

use super::lexer::Lexer;
use super::{ConvKernel, MAX_DIM, PRECISION, Target};

/// Parse every well-formed record in `input`, in encounter order.
pub fn parse_records(input: &str) -> Vec<ConvKernel> {
    let mut lx = Lexer::new(input);
    let mut kernels = Vec::new();
    while let Some(name) = lx.token() {
        match parse_record(&mut lx, name) {
            Ok(kernel) => kernels.push(kernel),
            Err(recovery) => recover(&mut lx, recovery),
        }
    }
    kernels
}

/// Where a malformed record leaves the token stream.
enum Recovery {
    /// Failed before or inside the weight braces: resync past the next `}`
    /// plus the three trailing tokens.
    Body,
    /// Failed in the trailing tokens; this many of them are still unread.
    Tail(usize),
}

fn recover(lx: &mut Lexer, recovery: Recovery) {
    let tail = match recovery {
        Recovery::Tail(n) => n,
        Recovery::Body => loop {
            match lx.token() {
                Some("}") => break 3,
                Some(_) => {}
                None => return,
            }
        },
    };
    for _ in 0..tail {
        if lx.token().is_none() {
            return;
        }
    }
}

fn uint(lx: &mut Lexer) -> Result<u32, Recovery> {
    lx.token()
        .and_then(|t| t.parse().ok())
        .ok_or(Recovery::Body)
}

fn parse_record(lx: &mut Lexer, name: &str) -> Result<ConvKernel, Recovery> {
    let width = uint(lx)?;
    let height = uint(lx)?;
    if !(1..=MAX_DIM).contains(&width) || !(1..=MAX_DIM).contains(&height) {
        return Err(Recovery::Body);
    }

    let cx = uint(lx)?;
    let cy = uint(lx)?;
    if cx >= width || cy >= height {
        return Err(Recovery::Body);
    }

    if lx.token() != Some("{") {
        return Err(Recovery::Body);
    }

    let count = (width * height) as usize;
    let mut weights = Vec::with_capacity(count);
    let mut sum: i64 = 0;
    for _ in 0..count {
        let tok = lx.token().ok_or(Recovery::Body)?;
        if tok == "}" {
            // Too few weights; the brace is already consumed.
            return Err(Recovery::Tail(3));
        }
        let value: f64 = tok.parse().map_err(|_| Recovery::Body)?;
        let scaled = (value * PRECISION as f64) as i32;
        weights.push(scaled);
        sum += scaled as i64;
    }

    if lx.token() != Some("}") {
        return Err(Recovery::Body);
    }

    let (mut div, mut bias) = match sum {
        s if s > 0 => (s, 0),
        0 => (PRECISION as i64, 128),
        s => (-s, 255),
    };

    let tok = lx.token().ok_or(Recovery::Tail(2))?;
    if !tok.eq_ignore_ascii_case("auto") {
        let value: f64 = tok.parse().map_err(|_| Recovery::Tail(2))?;
        div = (value * PRECISION as f64) as i64;
    }

    let tok = lx.token().ok_or(Recovery::Tail(1))?;
    if !tok.eq_ignore_ascii_case("auto") {
        let value: f64 = tok.parse().map_err(|_| Recovery::Tail(1))?;
        bias = value as i64;
    }

    let tok = lx.token().ok_or(Recovery::Tail(0))?;
    let mut target = Target::default();
    for ch in tok.chars() {
        match ch.to_ascii_lowercase() {
            'r' => target.r = true,
            'g' => target.g = true,
            'b' => target.b = true,
            'a' => target.a = true,
            _ => {}
        }
    }

    let div = div.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    let bias = bias.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    ConvKernel::new(name, width, height, cx, cy, weights, div, bias, target)
        .map_err(|_| Recovery::Tail(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_record_with_auto() {
        let kernels = parse_records("blur3 3 3 1 1 { 1 1 1 1 1 1 1 1 1 } auto auto rgba");
        assert_eq!(kernels.len(), 1);
        let k = &kernels[0];
        assert_eq!(k.name(), "blur3");
        assert_eq!((k.width(), k.height()), (3, 3));
        assert_eq!(k.center(), (1, 1));
        assert_eq!(k.weights(), &[256; 9]);
        // Positive sum: divisor = sum, bias = 0
        assert_eq!(k.div(), 9 * 256);
        assert_eq!(k.bias(), 0);
        assert_eq!(k.default_target(), Target::RGBA);
    }

    #[test]
    fn zero_sum_auto_resolves_to_precision_and_128() {
        let kernels = parse_records("edge 3 3 1 1 { -1 -1 -1 -1 8 -1 -1 -1 -1 } auto auto rgb");
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].div(), PRECISION);
        assert_eq!(kernels[0].bias(), 128);
    }

    #[test]
    fn negative_sum_auto_resolves_to_abs_and_255() {
        let kernels = parse_records("neg 1 1 0 0 { -2 } auto auto rgb");
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].div(), 512);
        assert_eq!(kernels[0].bias(), 255);
    }

    #[test]
    fn explicit_divisor_is_scaled_explicit_bias_is_not() {
        let kernels = parse_records("k 1 1 0 0 { 1 } 2 16 rgb");
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].div(), 512);
        assert_eq!(kernels[0].bias(), 16);
    }

    #[test]
    fn auto_is_case_insensitive() {
        let kernels = parse_records("k 1 1 0 0 { 1 } AUTO Auto rgb");
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].div(), 256);
        assert_eq!(kernels[0].bias(), 0);
    }

    #[test]
    fn fractional_weights_scale_into_fixed_point() {
        let kernels = parse_records("k 2 1 0 0 { 0.5 -0.25 } auto auto rgb");
        assert_eq!(kernels[0].weights(), &[128, -64]);
    }

    #[test]
    fn target_letters_case_insensitive_unknown_ignored() {
        let kernels = parse_records("k 1 1 0 0 { 1 } auto auto RxGa");
        let t = kernels[0].default_target();
        assert!(t.r && t.g && t.a);
        assert!(!t.b);
        assert!(!t.index);
    }

    #[test]
    fn bad_dimensions_discard_record_but_not_the_next() {
        let input = "huge 99 99 0 0 { 1 } auto auto rgb\n\
                     ok 1 1 0 0 { 1 } auto auto rgb";
        let kernels = parse_records(input);
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].name(), "ok");
    }

    #[test]
    fn bad_weight_token_discards_record_but_not_the_next() {
        let input = "broken 3 3 1 1 { 1 1 oops 1 1 1 1 1 1 } auto auto rgb\n\
                     ok 1 1 0 0 { 1 } auto auto rgb";
        let kernels = parse_records(input);
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].name(), "ok");
    }

    #[test]
    fn out_of_range_center_discards_record() {
        let input = "off 3 3 5 1 { 1 1 1 1 1 1 1 1 1 } auto auto rgb\n\
                     ok 1 1 0 0 { 1 } auto auto rgb";
        let kernels = parse_records(input);
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].name(), "ok");
    }

    #[test]
    fn too_few_weights_discards_record() {
        let input = "short 3 3 1 1 { 1 1 1 } auto auto rgb\n\
                     ok 1 1 0 0 { 1 } auto auto rgb";
        let kernels = parse_records(input);
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].name(), "ok");
    }

    #[test]
    fn truncated_input_yields_no_partial_record() {
        let kernels = parse_records("cut 3 3 1 1 { 1 1 1 1");
        assert!(kernels.is_empty());
    }

    #[test]
    fn multiple_records_keep_encounter_order() {
        let input = "a 1 1 0 0 { 1 } auto auto r\n\
                     b 1 1 0 0 { 1 } auto auto g\n\
                     c 1 1 0 0 { 1 } auto auto b";
        let names: Vec<String> = parse_records(input)
            .iter()
            .map(|k| k.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn comments_are_ignored() {
        let kernels = parse_records("# stock kernels\nk 1 1 0 0 { 1 } auto auto rgb # identity");
        assert_eq!(kernels.len(), 1);
    }
}
