//! Adapters — concrete implementations of the port traits in `app::ports`.
//!
//! | Adapter        | Implements        | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `multiplexer`  | `MultiplexerPort`  | 4 binary-select GPIOs        |
//! | `nvs`          | `KvStorePort`      | NVS / in-memory store        |
//! | `filesystem`   | `FilesystemPort`   | LittleFS VFS mount / `./data`|
//! | `time`         | `WallClockPort`    | ESP32 system clock           |
//! | `restarter`    | `RestarterPort`    | `esp_restart`                |

pub mod filesystem;
pub mod multiplexer;
pub mod nvs;
pub mod restarter;
pub mod time;
