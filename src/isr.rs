//! ISR-to-task handoff.
//!
//! The ADE7953 IRQ line is shared by CYCEND, RESET, CRC-change, and "other"
//! interrupt sources (distinguished by reading RSTIRQSTATA/B after the fact,
//! never inside the handler). The GPIO ISR itself does the absolute minimum
//! allowed in interrupt context: no logging, no heap allocation, no lock
//! acquisition, no SPI I/O. It just signals the metering task to wake up and
//! do the real work.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Binary semaphore the ADE7953 IRQ handler raises; the metering task awaits
/// it to learn "go read the interrupt status register".
static ADE7953_IRQ: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Called from ISR context only.
pub fn signal_from_isr() {
    ADE7953_IRQ.signal(());
}

/// Awaited by the metering task's main loop.
pub async fn wait_for_irq() {
    ADE7953_IRQ.wait().await;
}
