use std::{fs, path::Path};

use image::GenericImageView;
use kaze::{Kaze, KazeOptions};

fn replace_ext(filename: &str, new: &str) -> String {
    let stemmed = Path::new(filename).file_stem().unwrap().to_str().unwrap();
    format!("{stemmed}{new}")
}

fn main() {
    pretty_env_logger::init();
    let args: Vec<_> = std::env::args().collect();
    for path in &args[1..] {
        let image = image::open(path).unwrap();
        let options = KazeOptions::new(image.width() as usize, image.height() as usize);
        let (keypoints, descriptors) = Kaze::new(options).unwrap().extract(&image).unwrap();
        let mut kp_file = fs::File::create(replace_ext(path, "_kps.csv")).unwrap();
        let mut desc_file = fs::File::create(replace_ext(path, "_descs.txt")).unwrap();
        for (kp, descriptor) in keypoints.iter().zip(descriptors.outer_iter()) {
            std::io::Write::write_all(
                &mut kp_file,
                format!(
                    "{}, {}, {}, {}, {}, {}\n",
                    kp.point.0, kp.point.1, kp.angle, kp.size, kp.octave, kp.class_id
                )
                .as_bytes(),
            )
            .unwrap();
            let row: Vec<String> = descriptor.iter().map(|v| format!("{v:.6}")).collect();
            std::io::Write::write_all(
                &mut desc_file,
                format!("{}\n", row.join(" ")).as_bytes(),
            )
            .unwrap();
        }
    }
}
