//! GPIO / peripheral pin assignments for the energy monitor main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers. Values are drawn from the reference schematic
//! (ESP32-S3 + ADE7953 + 16:1 analog multiplexer).

// ---------------------------------------------------------------------------
// ADE7953 SPI bus
// ---------------------------------------------------------------------------

pub const ADE7953_SCK_GPIO: i32 = 14;
pub const ADE7953_MISO_GPIO: i32 = 13;
pub const ADE7953_MOSI_GPIO: i32 = 12;
pub const ADE7953_SS_GPIO: i32 = 11;

/// Active-low hardware reset line.
pub const ADE7953_RESET_GPIO: i32 = 9;

/// IRQ line, pulled low by the ADE7953 on CYCEND / RESET / CRC-change / other.
pub const ADE7953_IRQ_GPIO: i32 = 10;

/// SPI clock, Mode 0, MSB-first. Capped well under the part's 2 MHz ceiling
/// to leave margin on long wiring runs to the multiplexed CT inputs.
pub const ADE7953_SPI_FREQ_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// 16:1 analog multiplexer (binary-select, S0 = LSB)
// ---------------------------------------------------------------------------

pub const MULTIPLEXER_S0_GPIO: i32 = 36;
pub const MULTIPLEXER_S1_GPIO: i32 = 35;
pub const MULTIPLEXER_S2_GPIO: i32 = 45;
pub const MULTIPLEXER_S3_GPIO: i32 = 48;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 4;
pub const LED_G_GPIO: i32 = 5;
pub const LED_B_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// User button (active-low with external pull-up)
// ---------------------------------------------------------------------------

pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;
