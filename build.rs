use std::path::Path;

fn main() {
    // Si existe una copia local de ONNX Runtime, añadirla a la ruta de búsqueda
    let local_ort = "onnxruntime-linux-x64-1.22.0/lib";
    if Path::new(local_ort).exists() {
        println!("cargo:rustc-link-search=native={}", local_ort);
    }

    println!("cargo:rerun-if-changed=onnxruntime-linux-x64-1.22.0/");
}
