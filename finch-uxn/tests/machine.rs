use finch_uxn::{Device, DeviceBus, DeviceType, Error, PortLog, State, Uxn};

/// Builds a VM with a [`PortLog`] bound on the console and screen pages
fn vm_with_devices() -> Uxn {
    let mut bus = DeviceBus::new();
    bus.bind(DeviceType::Console.index(), PortLog::new());
    bus.bind(DeviceType::Screen.index(), PortLog::new());
    Uxn::new(bus)
}

fn log(vm: &Uxn, dev: DeviceType, port: u8) -> Vec<u8> {
    vm.bus()
        .device(dev.index())
        .expect("device is not bound")
        .get(port)
        .to_vec()
}

#[test]
fn console_write() {
    let mut vm = vm_with_devices();
    let addr = DeviceType::Console.base() + 8;
    vm.run(&[0x80, 0x43, 0x80, addr, 0x17]).unwrap();
    assert_eq!(log(&vm, DeviceType::Console, 0x08), [0x43]);
    assert!(vm.stack().is_empty());
}

#[test]
fn screen_write() {
    let mut vm = vm_with_devices();
    let addr = DeviceType::Screen.base() + 7;
    vm.run(&[0x80, 0x43, 0x80, addr, 0x17]).unwrap();
    assert_eq!(log(&vm, DeviceType::Screen, 0x07), [0x43]);
    assert!(log(&vm, DeviceType::Console, 0x07).is_empty());
}

#[test]
fn device_log_is_newest_first() {
    let mut vm = vm_with_devices();
    vm.run(&[0x80, 0x41, 0x80, 0x18, 0x17, 0x80, 0x42, 0x80, 0x18, 0x17])
        .unwrap();
    assert_eq!(log(&vm, DeviceType::Console, 0x08), [0x42, 0x41]);
}

#[test]
fn unbound_device_is_ignored() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x43, 0x80, 0x38, 0x17, 0x80, 0x01]).unwrap();
    assert_eq!(vm.stack().as_slice(), [0x01]);
}

#[test]
fn add() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x43, 0x80, 0x42, 0x18]).unwrap();
    assert_eq!(vm.stack().as_slice(), [0x85]);
}

#[test]
fn relative_jump() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x02, 0x0c, 0x80, 0x01, 0x80, 0x03]).unwrap();
    assert_eq!(vm.stack().as_slice(), [0x03]);
    assert_eq!(vm.pc(), 0x07);
}

#[test]
fn absolute_jump() {
    // LIT2 0006 JMP2 LIT 01 LIT 02
    let mut vm = Uxn::default();
    vm.run(&[0xa0, 0x00, 0x06, 0x2c, 0x80, 0x01, 0x80, 0x02])
        .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x02]);
    assert_eq!(vm.pc(), 0x08);
}

#[test]
fn stash() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x02, 0x0f]).unwrap();
    assert!(vm.stack().is_empty());
    assert_eq!(vm.ret().as_slice(), [0x02]);
}

#[test]
fn jump_stash_return() {
    let mut program = [0x80, 0x00].repeat(255);
    program.extend([0x80, 0x01, 0x0e, 0x00, 0x80, 0x01]);
    let mut vm = Uxn::default();
    vm.run(&program).unwrap();
    // 0x0200: JSR, so 0x0201 is on the return stack
    assert_eq!(vm.ret().as_slice(), [0x02, 0x01]);
    assert_eq!(vm.stack().len(), 256);
    assert_eq!(vm.stack().as_slice().last(), Some(&0x01));
}

#[test]
fn subroutine() {
    // 00: LIT 03 JSR         ( call 06, returning to 03 )
    // 03: LIT 03 BRK
    // 06: LIT 04 JMP2r
    let mut vm = Uxn::default();
    vm.run(&[
        0x80, 0x03, 0x0e, 0x80, 0x03, 0x00, 0x80, 0x04, 0x6c, 0x80, 0x05,
    ])
    .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x04, 0x03]);
    assert!(vm.ret().is_empty());
    assert_eq!(vm.pc(), 0x05);
}

#[test]
fn jci_taken() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x01, 0x20, 0x00, 0x05, 0x80, 0x02, 0x80, 0x03])
        .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x03]);
}

#[test]
fn jci_taken_far() {
    let mut vm = Uxn::default();
    vm.run(&[
        0x80, 0x01, 0x20, 0x00, 0x07, 0x80, 0x02, 0x00, 0x00, 0x80, 0x03,
    ])
    .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x03]);
}

#[test]
fn jci_not_taken() {
    let mut vm = Uxn::default();
    vm.run(&[0x80, 0x00, 0x20, 0x00, 0x05, 0x80, 0x02, 0x80, 0x03])
        .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x02, 0x03]);
}

#[test]
fn jmi() {
    let mut vm = Uxn::default();
    vm.run(&[0x40, 0x00, 0x07, 0x80, 0x02, 0x00, 0x00, 0x80, 0x03])
        .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x03]);
}

#[test]
fn jsi() {
    // 00: JSI +6              ( call 06, returning to 03 )
    // 03: LIT 02 BRK
    // 06: LIT 03 JMP2r
    let mut vm = Uxn::default();
    vm.run(&[0x60, 0x00, 0x06, 0x80, 0x02, 0x00, 0x80, 0x03, 0x6c])
        .unwrap();
    assert_eq!(vm.stack().as_slice(), [0x03, 0x02]);
    assert!(vm.ret().is_empty());
}

#[test]
fn jsi_return_address() {
    let mut vm = Uxn::default();
    assert_eq!(vm.step(&[0x60, 0x00, 0x04, 0x00, 0x00]), Ok(State::Running));
    assert_eq!(vm.ret().as_slice(), [0x00, 0x03]);
    assert_eq!(vm.pc(), 0x04);
}

#[test]
fn truncated_jump_offset() {
    let mut vm = Uxn::default();
    assert_eq!(
        vm.run(&[0x80, 0x01, 0x20, 0x00]),
        Err(Error::TruncatedImmediate)
    );
    assert_eq!(vm.stack().as_slice(), [0x01]);
    assert_eq!(vm.pc(), 0x02);
}

#[test]
fn unknown_opcode() {
    let mut vm = Uxn::default();
    assert_eq!(
        vm.run(&[0x80, 0x01, 0x09, 0x80, 0x02]),
        Err(Error::UnknownOpcode(0x09))
    );
    assert_eq!(vm.pc(), 0x02);
    assert_eq!(vm.stack().as_slice(), [0x01]);

    for b in [0x0a, 0x0b, 0x0d, 0x10, 0x16, 0x19, 0x1f, 0x3b, 0xff] {
        let mut vm = Uxn::default();
        assert_eq!(vm.run(&[b]), Err(Error::UnknownOpcode(b)));
    }
}

#[test]
fn counting_loop() {
    // 00: LIT 00
    // 02: INC DUP LIT ff EQU      ( loop body )
    // 07: JCI +7                  ( exit to 0e once the counter hits ff )
    // 0a: LIT2 0002 JMP2
    // 0e: BRK
    let program = [
        0x80, 0x00, 0x01, 0x06, 0x80, 0xff, 0x08, 0x20, 0x00, 0x07, 0xa0,
        0x00, 0x02, 0x2c, 0x00,
    ];
    let mut vm = Uxn::default();
    vm.run(&program).unwrap();
    assert_eq!(vm.stack().as_slice(), [0xff]);
    assert_eq!(vm.pc(), 0x0e);
}

#[test]
fn independent_machines() {
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            std::thread::spawn(move || {
                let mut vm = Uxn::default();
                vm.run(&[0x80, i, 0x01]).unwrap();
                vm.stack().as_slice().to_vec()
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap(), [i as u8 + 1]);
    }
}
