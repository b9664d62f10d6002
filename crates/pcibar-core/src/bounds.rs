use crate::error::{Error, Result};
use crate::resource::PhysicalResource;

/// A caller's requested dump range. The length is advisory and may be
/// clamped to what the resource can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRequest {
    pub offset: u64,
    pub len: u64,
}

/// A request after validation.
///
/// Invariant: `offset + len` never exceeds the length of the resource that
/// produced it, so reads over this range cannot escape the mapped window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveRange {
    pub offset: u64,
    pub len: u64,
}

/// Validates a request against the resource, clamping an overrunning length.
///
/// Returns the effective range plus whether it was clamped. An offset at or
/// past the end of the resource is fatal. This runs strictly before any
/// mapping call, so a rejected request never maps.
pub fn clamp_range(
    resource: PhysicalResource,
    request: DumpRequest,
) -> Result<(EffectiveRange, bool)> {
    if request.offset >= resource.len {
        return Err(Error::OutOfRange {
            offset: request.offset,
            length: resource.len,
        });
    }
    let available = resource.len - request.offset;
    if request.len > available {
        tracing::warn!(
            offset = request.offset,
            requested = request.len,
            effective = available,
            resource_len = resource.len,
            "requested range exceeds BAR0, clamping"
        );
        return Ok((
            EffectiveRange {
                offset: request.offset,
                len: available,
            },
            true,
        ));
    }
    Ok((
        EffectiveRange {
            offset: request.offset,
            len: request.len,
        },
        false,
    ))
}
