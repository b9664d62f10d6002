//! Property tests for the parsing and bounds layers.

use proptest::prelude::*;

use crate::bdf::Bdf;
use crate::bounds::{clamp_range, DumpRequest};
use crate::error::Error;
use crate::resource::PhysicalResource;

proptest! {
    #[test]
    fn bdf_parses_any_case(
        domain in any::<u16>(),
        bus in any::<u8>(),
        device in any::<u8>(),
        function in 0u8..16,
    ) {
        let canonical = format!("{domain:04x}:{bus:02x}:{device:02x}.{function:x}");
        let expected = Bdf { domain, bus, device, function };

        let lower: Bdf = canonical.parse().unwrap();
        prop_assert_eq!(lower, expected);

        let upper: Bdf = canonical.to_uppercase().parse().unwrap();
        prop_assert_eq!(upper, expected);

        // Display renders the canonical lower-case form back.
        prop_assert_eq!(lower.to_string(), canonical);
    }

    #[test]
    fn clamp_never_escapes_the_resource(
        len in 1u64..(1 << 40),
        offset in 0u64..(1 << 41),
        requested in 0u64..(1 << 41),
    ) {
        let resource = PhysicalResource { base: 0x1000, len };
        match clamp_range(resource, DumpRequest { offset, len: requested }) {
            Ok((range, clamped)) => {
                prop_assert!(offset < len);
                prop_assert_eq!(range.offset, offset);
                prop_assert!(range.offset + range.len <= len);
                if clamped {
                    prop_assert_eq!(range.len, len - offset);
                    prop_assert!(requested > range.len);
                } else {
                    prop_assert_eq!(range.len, requested);
                }
            }
            Err(Error::OutOfRange { .. }) => prop_assert!(offset >= len),
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn arbitrary_strings_never_panic_the_bdf_parser(s in "\\PC{0,16}") {
        let _ = s.parse::<Bdf>();
    }
}
