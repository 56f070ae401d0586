extern crate exr_bridge;

use exr_bridge::prelude::*;
use std::io::Cursor;
use std::cell::RefCell;


fn gradient_header() -> Header {
    Header::from_dimensions((5, 3))
        .with_channel("G", Channel::new(SampleType::F32)).unwrap()
        .with_compression(Compression::ZIP1)
}

fn gradient() -> Vec<f32> {
    (0 .. 15).map(|index| index as f32 / 15.0).collect()
}

fn write_gradient(stream: impl OutputStream) {
    let pixels = gradient();
    let mut file = OutputFile::from_stream(stream, gradient_header()).unwrap();

    let mut frame_buffer = FrameBuffer::new();
    frame_buffer.insert_interleaved(&["G"], &pixels, 5, (0, 0)).unwrap();
    file.set_frame_buffer(frame_buffer).unwrap().write_pixels(3).unwrap();
    file.finish().unwrap();
}

fn read_gradient(stream: impl InputStream) -> Result<Vec<f32>, Error> {
    let mut file = InputFile::from_stream(stream)?;
    let mut pixels = vec![0.0_f32; 15];

    {
        let mut frame_buffer = FrameBuffer::new();
        frame_buffer.insert_interleaved(&["G"], &mut pixels, 5, (0, 0))?;
        file.set_frame_buffer(frame_buffer)?.read_pixels(0, 2)?;
    }

    Ok(pixels)
}


#[test]
fn std_io_callbacks(){
    let mut output = CallbackOutputStream::new(IoCallbacks(Cursor::new(Vec::new()))).unwrap();
    write_gradient(&mut output);

    let IoCallbacks(cursor) = output.into_inner();
    let bytes = cursor.into_inner();

    let input = CallbackInputStream::new(IoCallbacks(Cursor::new(bytes.as_slice()))).unwrap();
    assert_eq!(read_gradient(input).unwrap(), gradient());

    // the same bytes through a memory stream
    assert_eq!(read_gradient(MemoryInputStream::new("memory", &bytes)).unwrap(), gradient());
}

#[test]
fn status_code_callbacks(){
    let mut output = MemoryOutputStream::new();
    write_gradient(&mut output);
    let bytes = output.into_inner();

    let position = RefCell::new(0_usize);

    let callbacks = FnCallbacks::new(
        |buffer: &mut [u8], error: &mut i32| {
            let mut position = position.borrow_mut();
            match bytes.get(*position .. *position + buffer.len()) {
                Some(source) => {
                    buffer.copy_from_slice(source);
                    *position += buffer.len();
                    0
                },
                None => { *error = 5; 1 },
            }
        },
        |target: u64, _error: &mut i32| {
            *position.borrow_mut() = target as usize;
            0
        },
    );

    assert_eq!(read_gradient(CallbackInputStream::new(callbacks).unwrap()).unwrap(), gradient());
}

#[test]
fn environment_errors_keep_their_code(){
    let failing = FnCallbacks::new(
        |_buffer: &mut [u8], error: &mut i32| { *error = 13; 1 },
        |_position: u64, _error: &mut i32| 0,
    );

    let error = read_gradient(CallbackInputStream::new(failing).unwrap()).unwrap_err();
    assert!(error.is_environment_error());
    assert_eq!(error.os_error_code(), Some(13));

    let unspecified = FnCallbacks::new(
        |_buffer: &mut [u8], _error: &mut i32| 7,
        |_position: u64, _error: &mut i32| 0,
    );

    let error = read_gradient(CallbackInputStream::new(unspecified).unwrap()).unwrap_err();
    assert!(!error.is_environment_error());
    assert!(matches!(error, Error::Stream(_)));
}

#[test]
fn files_on_disk(){
    let path = std::env::temp_dir().join(format!("exr-bridge-streams-{}.exr", std::process::id()));

    {
        let pixels = gradient();
        let mut file = OutputFile::from_path(&path, gradient_header()).unwrap();

        let mut frame_buffer = FrameBuffer::new();
        frame_buffer.insert_interleaved(&["G"], &pixels, 5, (0, 0)).unwrap();
        file.set_frame_buffer(frame_buffer).unwrap().write_pixels(3).unwrap();

        // dropping writes the offset table
    }

    let mut file = InputFile::from_path(&path).unwrap();
    assert_eq!(file.header().compression, Compression::ZIP1);

    let mut pixels = vec![0.0_f32; 15];

    {
        let mut frame_buffer = FrameBuffer::new();
        frame_buffer.insert_interleaved(&["G"], &mut pixels, 5, (0, 0)).unwrap();
        file.set_frame_buffer(frame_buffer).unwrap().read_pixels(0, 2).unwrap();
    }

    drop(file);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(pixels, gradient());

    let missing = InputFile::from_path(&path).unwrap_err();
    assert!(missing.is_environment_error());
}

#[test]
fn incomplete_files_report_missing_blocks(){
    let mut output = MemoryOutputStream::new();

    {
        let pixels = gradient();
        let mut file = OutputFile::from_stream(&mut output, gradient_header()).unwrap();

        let mut frame_buffer = FrameBuffer::new();
        frame_buffer.insert_interleaved(&["G"], &pixels, 5, (0, 0)).unwrap();
        file.set_frame_buffer(frame_buffer).unwrap().write_pixels(2).unwrap();
        file.finish().unwrap();
    }

    let bytes = output.into_inner();
    let mut file = InputFile::from_slice(&bytes).unwrap();
    let mut pixels = vec![0.0_f32; 15];

    {
        let mut frame_buffer = FrameBuffer::new();
        frame_buffer.insert_interleaved(&["G"], &mut pixels, 5, (0, 0)).unwrap();

        let mut reader = file.set_frame_buffer(frame_buffer).unwrap();
        reader.read_pixels(0, 1).unwrap();
        assert!(matches!(reader.read_pixels(2, 2), Err(Error::Invalid(_))));
    }

    assert_eq!(pixels[.. 10], gradient()[.. 10]);
}
