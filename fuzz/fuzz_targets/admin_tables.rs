#![no_main]

use libfuzzer_sys::fuzz_target;
use volprobe_backend::parse::{
    admin_volume_listed, docker_volume_listed, parse_access_table, parse_vm_list, table_rows,
};

fuzz_target!(|input: (&str, &str)| {
    let (table, requested) = input;

    let _ = table_rows(table);
    let _ = parse_vm_list(table);
    let _ = parse_access_table(table);
    let _ = admin_volume_listed(table, requested);
    let _ = docker_volume_listed(table, requested);
});
