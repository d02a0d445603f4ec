// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus request handling for the server roles
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! Both services answer from the shared [`RegisterBank`]:
//!
//! | Function | Code | Table |
//! |----------|------|-------|
//! | Read Coils | 0x01 | coils (by uid) |
//! | Read Discrete Inputs | 0x02 | discrete inputs (by uid) |
//! | Read Holding Registers | 0x03 | holding |
//! | Read Input Registers | 0x04 | input |
//! | Write Single Coil | 0x05 | coils |
//! | Write Single Register | 0x06 | holding |
//! | Write Multiple Coils | 0x0F | coils |
//! | Write Multiple Registers | 0x10 | holding |
//!
//! Any access outside the tables answers `IllegalDataAddress`, any other
//! function answers `IllegalFunction`.

use std::future;
use std::sync::Arc;

use log::{debug, error};
use tokio_modbus::prelude::*;

use crate::registers::{BankError, RegisterBank, RegisterKind};

fn illegal_address(err: BankError) -> ExceptionCode {
    error!("Exception::IllegalDataAddress - {}", err);
    ExceptionCode::IllegalDataAddress
}

/// Service of the TCP server role
#[derive(Debug, Clone)]
pub struct RegisterService {
    bank: Arc<RegisterBank>,
}

impl RegisterService {
    pub fn new(bank: Arc<RegisterBank>) -> Self {
        Self { bank }
    }

    /// Answer a request from the bank
    pub fn handle(&self, req: Request<'_>) -> Result<Response, ExceptionCode> {
        debug!("Received Modbus request: {:?}", req);
        let bank = &self.bank;

        match req {
            Request::ReadCoils(addr, cnt) => bank
                .read_coils(addr, cnt)
                .map(Response::ReadCoils)
                .map_err(illegal_address),
            Request::ReadDiscreteInputs(addr, cnt) => bank
                .read_discrete_inputs(addr, cnt)
                .map(Response::ReadDiscreteInputs)
                .map_err(illegal_address),
            Request::ReadHoldingRegisters(addr, cnt) => bank
                .read(RegisterKind::Holding, addr, cnt)
                .map(Response::ReadHoldingRegisters)
                .map_err(illegal_address),
            Request::ReadInputRegisters(addr, cnt) => bank
                .read(RegisterKind::Input, addr, cnt)
                .map(Response::ReadInputRegisters)
                .map_err(illegal_address),
            Request::WriteSingleCoil(addr, value) => bank
                .write_coils(addr, std::slice::from_ref(&value))
                .map(|_| Response::WriteSingleCoil(addr, value))
                .map_err(illegal_address),
            Request::WriteMultipleCoils(addr, values) => bank
                .write_coils(addr, &values)
                .map(|_| Response::WriteMultipleCoils(addr, values.len() as u16))
                .map_err(illegal_address),
            Request::WriteSingleRegister(addr, value) => bank
                .write(RegisterKind::Holding, addr, std::slice::from_ref(&value))
                .map(|_| Response::WriteSingleRegister(addr, value))
                .map_err(illegal_address),
            Request::WriteMultipleRegisters(addr, values) => bank
                .write(RegisterKind::Holding, addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
                .map_err(illegal_address),
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for RegisterService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.handle(req))
    }
}

/// Service of the RTU server role
///
/// A serial line is shared by several devices: requests for another unit
/// id are ignored, broadcasts (unit id 0) are processed without reply.
#[derive(Debug, Clone)]
pub struct SerialRegisterService {
    unit_id: u8,
    inner: RegisterService,
}

impl SerialRegisterService {
    pub fn new(unit_id: u8, bank: Arc<RegisterBank>) -> Self {
        Self {
            unit_id,
            inner: RegisterService::new(bank),
        }
    }
}

impl tokio_modbus::server::Service for SerialRegisterService {
    type Request = SlaveRequest<'static>;
    type Response = Option<Response>;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let SlaveRequest { slave, request } = req;
        let res = if slave == 0 {
            if let Err(e) = self.inner.handle(request) {
                debug!("Broadcast request failed: {:?}", e);
            }
            Ok(None)
        } else if slave != self.unit_id {
            Ok(None)
        } else {
            self.inner.handle(request).map(Some)
        };
        future::ready(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::layout::POINTER_TABLE;
    use tokio_modbus::server::Service;

    #[tokio::test]
    async fn test_holding_write_then_read() {
        let bank = Arc::new(RegisterBank::new());
        let service = RegisterService::new(bank.clone());

        let written = service
            .call(Request::WriteSingleRegister(POINTER_TABLE + 3, 77))
            .await;
        assert_eq!(written, Ok(Response::WriteSingleRegister(POINTER_TABLE + 3, 77)));
        assert_eq!(bank.get(RegisterKind::Holding, POINTER_TABLE + 3), Some(77));
        assert_eq!(bank.get(RegisterKind::Input, POINTER_TABLE + 3), Some(0));
    }

    #[tokio::test]
    async fn test_out_of_range_is_illegal_address() {
        let service = RegisterService::new(Arc::new(RegisterBank::new()));
        let res = service.call(Request::ReadInputRegisters(0, 4)).await;
        assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));
    }

    #[tokio::test]
    async fn test_serial_service_filters_unit_id() {
        let bank = Arc::new(RegisterBank::new());
        let service = SerialRegisterService::new(7, bank.clone());

        let other = service
            .call(SlaveRequest {
                slave: 8,
                request: Request::WriteSingleCoil(3, true),
            })
            .await;
        assert_eq!(other, Ok(None));
        assert_eq!(bank.read_coils(3, 1), Ok(vec![false]));

        let broadcast = service
            .call(SlaveRequest {
                slave: 0,
                request: Request::WriteSingleCoil(3, true),
            })
            .await;
        assert_eq!(broadcast, Ok(None));
        assert_eq!(bank.read_coils(3, 1), Ok(vec![true]));

        let mine = service
            .call(SlaveRequest {
                slave: 7,
                request: Request::ReadCoils(3, 1),
            })
            .await;
        assert_eq!(mine, Ok(Some(Response::ReadCoils(vec![true]))));
    }
}
