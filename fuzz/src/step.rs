#![no_main]

use libfuzzer_sys::fuzz_target;
use uxn::{State, Uxn};

fuzz_target!(|data: &[u8]| {
    let mut vm = Uxn::default();

    // Programs can loop forever through JMP2, so stop after 65K cycles
    for _ in 0..65536 {
        let wst = vm.stack().clone();
        let rst = vm.ret().clone();
        let pc = vm.pc();
        match vm.step(data) {
            Ok(State::Running) => (),
            Ok(State::Stopped) => break,
            Err(e) => {
                assert_eq!(vm.pc(), pc, "{e} moved the program counter");
                assert_eq!(vm.stack(), &wst, "{e} modified the working stack");
                assert_eq!(vm.ret(), &rst, "{e} modified the return stack");
                break;
            }
        }
    }
});
