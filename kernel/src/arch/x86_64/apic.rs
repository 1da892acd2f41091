/*
 * Local APIC Access (x2APIC mode)
 *
 * The scheduler only needs three things from the local APIC: the id of the
 * running core, sending a fixed-vector IPI to another core, and signalling
 * end-of-interrupt for that IPI. In x2APIC mode all three are MSR accesses,
 * so no MMIO mapping is involved. Programming the APIC (enabling x2APIC,
 * timer setup) belongs to the platform bring-up code.
 */

use x86::msr::{IA32_X2APIC_EOI, IA32_X2APIC_ICR, wrmsr};

/// ICR level bit: must be set for fixed delivery
const ICR_LEVEL_ASSERT: u64 = 1 << 14;

/// x2APIC id of the calling core
///
/// CPUID leaf 0xB reports the full 32-bit id. Leaf 1 only has the low 8
/// bits, so it is a fallback for cores without the topology leaf, where ids
/// never exceed 255 anyway.
pub fn local_apic_id() -> u32 {
    let cpuid = x86::cpuid::CpuId::new();
    cpuid
        .get_extended_topology_info()
        .and_then(|mut levels| levels.next())
        .map(|level| level.x2apic_id())
        .or_else(|| {
            cpuid
                .get_feature_info()
                .map(|info| info.initial_local_apic_id() as u32)
        })
        .unwrap_or(0)
}

/// Send a fixed-delivery, physical-destination IPI
///
/// # Safety
/// The local APIC must be enabled in x2APIC mode and `vector` must have an
/// IDT handler on the destination core.
pub unsafe fn send_fixed_ipi(dest_apic_id: u32, vector: u8) {
    let icr = ((dest_apic_id as u64) << 32) | ICR_LEVEL_ASSERT | vector as u64;
    unsafe { wrmsr(IA32_X2APIC_ICR, icr) };
}

/// Signal end-of-interrupt to the local APIC
///
/// # Safety
/// Must be called from the handler of an APIC-delivered interrupt with the
/// local APIC in x2APIC mode.
pub unsafe fn end_of_interrupt() {
    unsafe { wrmsr(IA32_X2APIC_EOI, 0) };
}
