//! BLE radio adapter.
//!
//! - **`target_os = "espidf"`** — [`BluedroidRadio`] drives the ESP-IDF
//!   Bluedroid GATT server: one primary service with an RX (write /
//!   write-without-response) and a TX (notify + read, with CCCD)
//!   characteristic.
//! - **host** — [`NullRadio`] answers every call with
//!   [`HwError::Unavailable`], so the engine fails bring-up cleanly.
//!
//! Bluedroid callbacks are C function pointers that cannot capture Rust
//! state.  They translate each callback into a [`RadioEvent`] and push it
//! onto a static [`EventQueue`]; registration results are bridged through
//! atomics that `register_service` waits on.

use crate::app::ports::{AdvParams, RadioPort, ServiceHandles, ServiceIds};
use crate::config::ConnParams;
use crate::error::{HwError, HwResult};
use crate::events::RadioEvent;

// ───────────────────────────────────────────────────────────────
// Host stand-in
// ───────────────────────────────────────────────────────────────

/// Radio for targets without BLE hardware.
#[derive(Debug, Default)]
pub struct NullRadio;

impl RadioPort for NullRadio {
    fn activate(&mut self) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn deactivate(&mut self) -> HwResult<()> {
        Ok(())
    }

    fn set_device_name(&mut self, _name: &str) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn set_local_mtu(&mut self, _mtu: u16) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn register_service(&mut self, _ids: &ServiceIds) -> HwResult<ServiceHandles> {
        Err(HwError::Unavailable)
    }

    fn start_advertising(&mut self, _params: &AdvParams<'_>) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn stop_advertising(&mut self) -> HwResult<()> {
        Ok(())
    }

    fn is_advertising(&self) -> Option<bool> {
        Some(false)
    }

    fn notify(&mut self, _conn: u16, _handle: u16, _data: &[u8]) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn read_local(&mut self, _handle: u16) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn update_conn_params(&mut self, _conn: u16, _params: &ConnParams) -> HwResult<()> {
        Err(HwError::Unavailable)
    }

    fn disconnect(&mut self, _conn: u16) -> HwResult<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::BluedroidRadio;

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::ffi::CString;
    use std::sync::Mutex;

    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::sys::*;
    use log::{debug, info, warn};

    use super::*;
    use crate::events::{EVENT_QUEUE_CAP, EventQueue};

    /// Client Characteristic Configuration descriptor.
    const CCCD_UUID: u16 = 0x2902;
    /// Attribute handles reserved for the service.
    const SERVICE_HANDLE_COUNT: u16 = 8;
    const REGISTER_TIMEOUT_MS: u32 = 2000;
    const REGISTER_POLL_MS: u32 = 10;

    // Registration progress, written from the GATTS task.
    const STEP_IDLE: u32 = 0;
    const STEP_RX: u32 = 1;
    const STEP_TX: u32 = 2;
    const STEP_CCCD: u32 = 3;
    const STEP_DONE: u32 = 4;
    const STEP_FAILED: u32 = u32::MAX;

    static EVENTS: EventQueue<EVENT_QUEUE_CAP> = EventQueue::new();

    static GATTS_IF: AtomicU32 = AtomicU32::new(ESP_GATT_IF_NONE as u32);
    static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    static RX_HANDLE: AtomicU32 = AtomicU32::new(0);
    static TX_HANDLE: AtomicU32 = AtomicU32::new(0);
    static REG_STEP: AtomicU32 = AtomicU32::new(STEP_IDLE);
    static ADVERTISING: AtomicBool = AtomicBool::new(false);
    static SERVICE_IDS: Mutex<Option<ServiceIds>> = Mutex::new(None);
    /// Address of the connected central, keyed by connection id.
    static PEER: Mutex<Option<(u16, esp_bd_addr_t)>> = Mutex::new(None);

    fn check(ret: esp_err_t, what: &'static str) -> HwResult<()> {
        if ret == ESP_OK as esp_err_t {
            Ok(())
        } else {
            warn!("BLE: {} failed ({})", what, ret);
            Err(HwError::Transient(what))
        }
    }

    fn uuid128(uuid: u128) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = ESP_UUID_LEN_128 as u16;
        t.uuid.uuid128 = uuid.to_le_bytes();
        t
    }

    fn uuid16(uuid: u16) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = ESP_UUID_LEN_16 as u16;
        t.uuid.uuid16 = uuid;
        t
    }

    fn registered_ids() -> Option<ServiceIds> {
        SERVICE_IDS.lock().ok().and_then(|ids| *ids)
    }

    unsafe fn add_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) -> esp_err_t {
        let mut char_uuid = uuid128(uuid);
        unsafe {
            esp_ble_gatts_add_char(
                svc_handle,
                &mut char_uuid,
                perm as esp_gatt_perm_t,
                prop as esp_gatt_char_prop_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            )
        }
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                let ok = unsafe { (*param).adv_start_cmpl.status } == esp_bt_status_t_ESP_BT_STATUS_SUCCESS;
                ADVERTISING.store(ok, Ordering::Release);
                debug!("BLE GAP: advertising start complete (ok={})", ok);
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
                ADVERTISING.store(false, Ordering::Release);
                debug!("BLE GAP: advertising stopped");
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                GATTS_IF.store(u32::from(gatts_if), Ordering::Release);
                let Some(ids) = registered_ids() else {
                    REG_STEP.store(STEP_FAILED, Ordering::Release);
                    return;
                };
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128(ids.service),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                let ret = unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, SERVICE_HANDLE_COUNT) };
                if ret != ESP_OK as esp_err_t {
                    REG_STEP.store(STEP_FAILED, Ordering::Release);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let p = unsafe { &(*param).create };
                let Some(ids) = registered_ids() else {
                    REG_STEP.store(STEP_FAILED, Ordering::Release);
                    return;
                };
                SVC_HANDLE.store(u32::from(p.service_handle), Ordering::Release);
                unsafe { esp_ble_gatts_start_service(p.service_handle) };
                REG_STEP.store(STEP_RX, Ordering::Release);
                let ret = unsafe {
                    add_char(
                        p.service_handle,
                        ids.rx,
                        ESP_GATT_PERM_WRITE,
                        ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR,
                    )
                };
                if ret != ESP_OK as esp_err_t {
                    REG_STEP.store(STEP_FAILED, Ordering::Release);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let p = unsafe { &(*param).add_char };
                let svc = SVC_HANDLE.load(Ordering::Acquire) as u16;
                match REG_STEP.load(Ordering::Acquire) {
                    STEP_RX => {
                        RX_HANDLE.store(u32::from(p.attr_handle), Ordering::Release);
                        REG_STEP.store(STEP_TX, Ordering::Release);
                        let Some(ids) = registered_ids() else {
                            REG_STEP.store(STEP_FAILED, Ordering::Release);
                            return;
                        };
                        let ret = unsafe {
                            add_char(
                                svc,
                                ids.tx,
                                ESP_GATT_PERM_READ,
                                ESP_GATT_CHAR_PROP_BIT_NOTIFY | ESP_GATT_CHAR_PROP_BIT_READ,
                            )
                        };
                        if ret != ESP_OK as esp_err_t {
                            REG_STEP.store(STEP_FAILED, Ordering::Release);
                        }
                    }
                    STEP_TX => {
                        TX_HANDLE.store(u32::from(p.attr_handle), Ordering::Release);
                        REG_STEP.store(STEP_CCCD, Ordering::Release);
                        let mut cccd = uuid16(CCCD_UUID);
                        let ret = unsafe {
                            esp_ble_gatts_add_char_descr(
                                svc,
                                &mut cccd,
                                (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                                core::ptr::null_mut(),
                                core::ptr::null_mut(),
                            )
                        };
                        if ret != ESP_OK as esp_err_t {
                            REG_STEP.store(STEP_FAILED, Ordering::Release);
                        }
                    }
                    _ => {}
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
                if REG_STEP.load(Ordering::Acquire) == STEP_CCCD {
                    REG_STEP.store(STEP_DONE, Ordering::Release);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let p = unsafe { &(*param).connect };
                // The controller stops advertising once a central connects.
                ADVERTISING.store(false, Ordering::Release);
                if let Ok(mut peer) = PEER.lock() {
                    *peer = Some((p.conn_id, p.remote_bda));
                }
                if !EVENTS.push(RadioEvent::Connected { conn: p.conn_id }) {
                    warn!("BLE: event queue full, connect dropped");
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                let p = unsafe { &(*param).disconnect };
                if let Ok(mut peer) = PEER.lock()
                    && peer.is_some_and(|(conn, _)| conn == p.conn_id)
                {
                    *peer = None;
                }
                if !EVENTS.push(RadioEvent::Disconnected { conn: p.conn_id }) {
                    warn!("BLE: event queue full, disconnect dropped");
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
                let p = unsafe { &(*param).mtu };
                let _ = EVENTS.push(RadioEvent::MtuChanged {
                    conn: p.conn_id,
                    mtu: p.mtu,
                });
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                let data = if p.value.is_null() {
                    &[][..]
                } else {
                    unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) }
                };
                if p.need_rsp {
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            esp_gatt_status_t_ESP_GATT_OK,
                            core::ptr::null_mut(),
                        );
                    }
                }
                if !EVENTS.push(RadioEvent::write(p.conn_id, p.handle, data)) {
                    warn!("BLE: event queue full, write dropped");
                }
            }
            _ => {}
        }
    }

    /// Bluedroid-backed radio.  Only one instance may exist: the callback
    /// bridge is process-global.
    pub struct BluedroidRadio {
        active: bool,
    }

    impl BluedroidRadio {
        pub fn new() -> Self {
            Self { active: false }
        }

        fn gatts_if() -> esp_gatt_if_t {
            GATTS_IF.load(Ordering::Acquire) as esp_gatt_if_t
        }
    }

    impl Default for BluedroidRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RadioPort for BluedroidRadio {
        fn activate(&mut self) -> HwResult<()> {
            if self.active {
                return Ok(());
            }
            unsafe {
                // BLE-only: classic BT memory is never needed.
                esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

                let mut bt_cfg = esp_bt_controller_config_t::default();
                check(esp_bt_controller_init(&mut bt_cfg), "bt_controller_init")?;
                check(esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE), "bt_controller_enable")?;
                check(esp_bluedroid_init(), "bluedroid_init")?;
                check(esp_bluedroid_enable(), "bluedroid_enable")?;
                check(esp_ble_gap_register_callback(Some(gap_event_handler)), "gap_register_callback")?;
                check(
                    esp_ble_gatts_register_callback(Some(gatts_event_handler)),
                    "gatts_register_callback",
                )?;
            }
            EVENTS.clear();
            self.active = true;
            info!("BLE: Bluedroid stack active");
            Ok(())
        }

        fn deactivate(&mut self) -> HwResult<()> {
            // Safe to call on a stack that was never brought up: each call
            // reports "invalid state" and is ignored.
            unsafe {
                esp_ble_gap_stop_advertising();
                esp_bluedroid_disable();
                esp_bluedroid_deinit();
                esp_bt_controller_disable();
                esp_bt_controller_deinit();
            }
            ADVERTISING.store(false, Ordering::Release);
            GATTS_IF.store(ESP_GATT_IF_NONE as u32, Ordering::Release);
            REG_STEP.store(STEP_IDLE, Ordering::Release);
            self.active = false;
            Ok(())
        }

        fn set_device_name(&mut self, name: &str) -> HwResult<()> {
            let c_name = CString::new(name).map_err(|_| HwError::Transient("device name contains NUL"))?;
            check(unsafe { esp_ble_gap_set_device_name(c_name.as_ptr()) }, "set_device_name")
        }

        fn set_local_mtu(&mut self, mtu: u16) -> HwResult<()> {
            check(unsafe { esp_ble_gatt_set_local_mtu(mtu) }, "set_local_mtu")
        }

        fn register_service(&mut self, ids: &ServiceIds) -> HwResult<ServiceHandles> {
            if let Ok(mut slot) = SERVICE_IDS.lock() {
                *slot = Some(*ids);
            } else {
                return Err(HwError::Transient("service id lock poisoned"));
            }
            REG_STEP.store(STEP_IDLE, Ordering::Release);
            check(unsafe { esp_ble_gatts_app_register(0) }, "gatts_app_register")?;

            let mut waited = 0;
            loop {
                match REG_STEP.load(Ordering::Acquire) {
                    STEP_DONE => break,
                    STEP_FAILED => return Err(HwError::Transient("service registration")),
                    _ if waited >= REGISTER_TIMEOUT_MS => {
                        return Err(HwError::Transient("service registration timed out"));
                    }
                    _ => {
                        FreeRtos::delay_ms(REGISTER_POLL_MS);
                        waited += REGISTER_POLL_MS;
                    }
                }
            }

            let handles = ServiceHandles {
                rx: RX_HANDLE.load(Ordering::Acquire) as u16,
                tx: TX_HANDLE.load(Ordering::Acquire) as u16,
            };
            if handles.rx == 0 || handles.tx == 0 {
                return Err(HwError::Transient("service registration returned null handles"));
            }
            Ok(handles)
        }

        fn start_advertising(&mut self, params: &AdvParams<'_>) -> HwResult<()> {
            if let Some(payload) = params.payload {
                let mut raw = heapless::Vec::<u8, 31>::new();
                raw.extend_from_slice(payload)
                    .map_err(|()| HwError::Transient("advertising payload too long"))?;
                check(
                    unsafe { esp_ble_gap_config_adv_data_raw(raw.as_mut_ptr(), raw.len() as u32) },
                    "config_adv_data_raw",
                )?;
            }

            // Interval unit is 0.625 ms.
            let (int_min, int_max) = match params.interval_ms {
                Some(ms) => {
                    let units = ((ms * 1000) / 625).clamp(0x20, 0x4000) as u16;
                    (units, units)
                }
                None => (0x20, 0x40),
            };
            let mut adv_params = esp_ble_adv_params_t {
                adv_int_min: int_min,
                adv_int_max: int_max,
                adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..unsafe { core::mem::zeroed() }
            };
            check(
                unsafe { esp_ble_gap_start_advertising(&mut adv_params) },
                "start_advertising",
            )?;
            ADVERTISING.store(true, Ordering::Release);
            Ok(())
        }

        fn stop_advertising(&mut self) -> HwResult<()> {
            ADVERTISING.store(false, Ordering::Release);
            check(unsafe { esp_ble_gap_stop_advertising() }, "stop_advertising")
        }

        fn is_advertising(&self) -> Option<bool> {
            Some(ADVERTISING.load(Ordering::Acquire))
        }

        fn notify(&mut self, conn: u16, handle: u16, data: &[u8]) -> HwResult<()> {
            let mut buf = data.to_vec();
            check(
                unsafe {
                    esp_ble_gatts_send_indicate(
                        Self::gatts_if(),
                        conn,
                        handle,
                        buf.len() as u16,
                        buf.as_mut_ptr(),
                        false,
                    )
                },
                "send_indicate",
            )
        }

        fn read_local(&mut self, handle: u16) -> HwResult<()> {
            let mut len: u16 = 0;
            let mut value: *const u8 = core::ptr::null();
            let status = unsafe { esp_ble_gatts_get_attr_value(handle, &mut len, &mut value) };
            if status == esp_gatt_status_t_ESP_GATT_OK {
                Ok(())
            } else {
                Err(HwError::Transient("get_attr_value"))
            }
        }

        fn update_conn_params(&mut self, conn: u16, params: &ConnParams) -> HwResult<()> {
            let bda = PEER
                .lock()
                .ok()
                .and_then(|peer| *peer)
                .filter(|(id, _)| *id == conn)
                .map(|(_, bda)| bda)
                .ok_or(HwError::Transient("no peer address for connection"))?;
            let mut update = esp_ble_conn_update_params_t {
                bda,
                min_int: params.interval_min,
                max_int: params.interval_max,
                latency: params.latency,
                timeout: params.supervision_timeout,
            };
            check(unsafe { esp_ble_gap_update_conn_params(&mut update) }, "update_conn_params")
        }

        fn disconnect(&mut self, conn: u16) -> HwResult<()> {
            check(unsafe { esp_ble_gatts_close(Self::gatts_if(), conn) }, "gatts_close")
        }

        fn poll_event(&mut self) -> Option<RadioEvent> {
            EVENTS.pop()
        }
    }
}
