//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter   | Implements    | Connects to                         |
//! |-----------|---------------|-------------------------------------|
//! | `radio`   | RadioPort     | Bluedroid GATT server / null radio  |
//! | `storage` | ConfigStore   | JSON file (SPIFFS on the device)    |
//! | `restart` | RestartPort   | `esp_restart`                       |
//! | `time`    | Clock         | ESP32 system timer / `Instant`      |

pub mod radio;
pub mod restart;
pub mod storage;
pub mod time;
