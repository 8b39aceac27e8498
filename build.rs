fn main() {
    println!("cargo:rerun-if-changed=src/uros_bindings.h");
    println!("cargo:rerun-if-env-changed=FORCEGAUGE_CONFIG_JSON");

    // Host builds (tests, simulation) never link ESP-IDF.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
