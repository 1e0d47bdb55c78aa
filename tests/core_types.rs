use picmatch::{parse_dataset, Dataset, ImageView, Object, PicMatchError, Picture, SquareImage};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0i32; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        PicMatchError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );
}

#[test]
fn image_view_rejects_small_buffer() {
    let data = [0i32; 3];

    let err = ImageView::new(&data, 2, 2, 2).err().unwrap();
    assert_eq!(err, PicMatchError::BufferTooSmall { needed: 4, got: 3 });
}

#[test]
fn padded_rows_are_trimmed_to_width() {
    let data: Vec<i32> = (0..12).collect();
    let view = ImageView::new(&data, 3, 3, 4).unwrap();
    assert_eq!(view.stride(), 4);
    assert_eq!(view.row(0).unwrap(), &[0, 1, 2]);
    assert_eq!(view.row(2).unwrap(), &[8, 9, 10]);
    assert_eq!(view.row(3), None);

    let err = ImageView::new(&data, 4, 2, 3).err().unwrap();
    assert!(matches!(err, PicMatchError::InvalidInput(_)));
}

#[test]
fn square_image_requires_exact_length() {
    let err = SquareImage::new(1, 3, vec![0; 8]).unwrap_err();
    assert_eq!(err, PicMatchError::BufferTooSmall { needed: 9, got: 8 });

    let err = Object::new(1, 2, vec![0; 5]).unwrap_err();
    assert_eq!(err, PicMatchError::BufferTooSmall { needed: 4, got: 5 });

    assert!(Picture::new(1, 0, Vec::new()).is_err());
}

#[test]
fn span_counts_candidate_offsets() {
    let picture = Picture::new(1, 5, vec![0; 25]).unwrap();
    assert_eq!(picture.span_for(1), Some(5));
    assert_eq!(picture.span_for(5), Some(1));
    assert_eq!(picture.span_for(6), None);
    assert_eq!(picture.span_for(0), None);
}

#[test]
fn dataset_validates_threshold_and_ids() {
    let picture = |id| Picture::new(id, 1, vec![1]).unwrap();

    let err = Dataset::new(f64::NAN, vec![picture(1)], Vec::new()).unwrap_err();
    assert!(matches!(err, PicMatchError::InvalidInput(_)));

    let err = Dataset::new(0.5, vec![picture(4), picture(2), picture(4)], Vec::new()).unwrap_err();
    assert_eq!(err, PicMatchError::DuplicatePictureId { id: 4 });

    let dataset = Dataset::new(0.5, vec![picture(4), picture(2)], Vec::new()).unwrap();
    let ids: Vec<i32> = dataset.pictures().iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![4, 2]);
    assert!(dataset.objects().is_empty());
}

#[test]
fn parser_accepts_arbitrary_whitespace() {
    let text = "  0.25\t1 5 2\n1 2 3\n4\n\n 0 ";
    let dataset = parse_dataset(text).unwrap();
    assert_eq!(dataset.pictures()[0].id(), 5);
    assert_eq!(dataset.pictures()[0].data(), &[1, 2, 3, 4]);
    assert!(dataset.objects().is_empty());
}

#[test]
fn parser_rejects_trailing_tokens() {
    let err = parse_dataset("0.1 0 0 42").unwrap_err();
    assert!(matches!(
        err,
        PicMatchError::InvalidToken {
            expected: "end of input",
            ..
        }
    ));
}
